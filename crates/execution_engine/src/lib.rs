//! execution_engine - The automation engine
//!
//! This crate is the heart of the automation system, responsible for:
//! - The engine lifecycle state machine (`machine`)
//! - The main execution loop with retry and backoff (`engine`)
//! - Error taxonomy and classification (`error`)
//! - Typed extension points called around each task (`hooks`)

pub mod engine;
pub mod error;
pub mod hooks;
pub mod machine;

// Re-exports
pub use engine::{AutomationEngine, EngineBuilder, EngineHandle};
pub use error::{EngineError, ErrorClass};
pub use hooks::{ExecutionHook, PromptBuilder, TaskPromptBuilder};
pub use machine::{EngineEvent, EngineState, StateMachine, StateTransition};
