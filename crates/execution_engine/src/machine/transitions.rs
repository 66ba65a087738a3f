//! State transitions - FSM transition logic
//!
//! Implements the event-driven machine behind the engine lifecycle.
//! Unknown (state, event) pairs leave the state unchanged, which is
//! what makes stop requests idempotent.

use super::events::EngineEvent;
use super::states::EngineState;

/// Represents a state transition result.
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// The state before the transition.
    pub from: EngineState,
    /// The state after the transition.
    pub to: EngineState,
    /// The event that triggered the transition.
    pub event: EngineEvent,
    /// Whether the state actually changed.
    pub changed: bool,
}

/// State machine for the engine lifecycle.
#[derive(Debug, Clone)]
pub struct StateMachine {
    /// Current state.
    current_state: EngineState,
    /// Transition history (limited).
    history: Vec<StateTransition>,
    /// Max history entries to keep.
    max_history: usize,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine in Idle state.
    pub fn new() -> Self {
        Self {
            current_state: EngineState::Idle,
            history: Vec::new(),
            max_history: 50,
        }
    }

    /// Create a state machine with a specific initial state.
    pub fn with_state(state: EngineState) -> Self {
        Self {
            current_state: state,
            history: Vec::new(),
            max_history: 50,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> &EngineState {
        &self.current_state
    }

    /// Get the transition history.
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Handle an event and transition to a new state.
    pub fn handle_event(&mut self, event: EngineEvent) -> StateTransition {
        let old_state = self.current_state.clone();
        let new_state = compute_next_state(&old_state, &event);
        let changed = old_state != new_state;

        self.current_state = new_state.clone();

        let transition = StateTransition {
            from: old_state,
            to: new_state,
            event,
            changed,
        };

        self.history.push(transition.clone());
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }

        transition
    }

    /// Check if a transition is valid without executing it.
    pub fn can_transition(&self, event: &EngineEvent) -> bool {
        compute_next_state(&self.current_state, event) != self.current_state
    }
}

/// Compute the next state given current state and event.
fn compute_next_state(state: &EngineState, event: &EngineEvent) -> EngineState {
    use EngineEvent::*;
    use EngineState::*;

    match (state, event) {
        // ========== Start / pause / resume ==========
        (Idle, StartRequested) => Running,
        (Running, PauseRequested) => Paused,
        (Paused, ResumeRequested) => Running,

        // ========== Stopping ==========
        // A stop request is honored from every state except Stopped.
        (Running | Paused, StopRequested) => Stopping,
        (Idle | Error { .. }, StopRequested) => Stopped,
        (Running, QueueDrained) => Stopping,
        (Stopping, ShutdownComplete) => Stopped,

        // ========== Faults ==========
        (Running | Paused | Stopping, FatalFault { message }) => Error {
            message: message.clone(),
        },

        // ========== Restart ==========
        (Stopped | Error { .. }, Reset) => Idle,

        // ========== Default: no transition ==========
        _ => state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_lifecycle() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.state(), &EngineState::Idle);

        let t1 = sm.handle_event(EngineEvent::StartRequested);
        assert!(t1.changed);
        assert_eq!(sm.state(), &EngineState::Running);

        sm.handle_event(EngineEvent::QueueDrained);
        assert_eq!(sm.state(), &EngineState::Stopping);

        sm.handle_event(EngineEvent::ShutdownComplete);
        assert_eq!(sm.state(), &EngineState::Stopped);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut sm = StateMachine::with_state(EngineState::Running);

        sm.handle_event(EngineEvent::PauseRequested);
        assert_eq!(sm.state(), &EngineState::Paused);

        sm.handle_event(EngineEvent::ResumeRequested);
        assert_eq!(sm.state(), &EngineState::Running);
    }

    #[test]
    fn test_stop_is_reachable_from_every_state_except_stopped() {
        for state in [
            EngineState::Idle,
            EngineState::Running,
            EngineState::Paused,
            EngineState::Error {
                message: "boom".into(),
            },
        ] {
            let mut sm = StateMachine::with_state(state);
            sm.handle_event(EngineEvent::StopRequested);
            assert!(matches!(
                sm.state(),
                EngineState::Stopping | EngineState::Stopped
            ));
        }
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut sm = StateMachine::with_state(EngineState::Stopping);
        let transition = sm.handle_event(EngineEvent::StopRequested);
        assert!(!transition.changed);
        assert_eq!(sm.state(), &EngineState::Stopping);
    }

    #[test]
    fn test_fatal_fault_enters_error_state() {
        let mut sm = StateMachine::with_state(EngineState::Running);
        sm.handle_event(EngineEvent::FatalFault {
            message: "repository failed for every task".into(),
        });
        assert!(matches!(sm.state(), EngineState::Error { .. }));

        // No dispatch until explicitly restarted from idle.
        let transition = sm.handle_event(EngineEvent::StartRequested);
        assert!(!transition.changed);

        sm.handle_event(EngineEvent::Reset);
        assert_eq!(sm.state(), &EngineState::Idle);
    }

    #[test]
    fn test_pause_while_idle_does_nothing() {
        let mut sm = StateMachine::new();
        let transition = sm.handle_event(EngineEvent::PauseRequested);
        assert!(!transition.changed);
    }

    #[test]
    fn test_history_tracking() {
        let mut sm = StateMachine::new();
        sm.handle_event(EngineEvent::StartRequested);
        sm.handle_event(EngineEvent::StopRequested);

        assert_eq!(sm.history().len(), 2);
    }
}
