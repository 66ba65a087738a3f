//! Engine lifecycle state machine

mod events;
mod states;
mod transitions;

pub use events::EngineEvent;
pub use states::EngineState;
pub use transitions::{StateMachine, StateTransition};
