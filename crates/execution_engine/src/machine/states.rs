//! Engine states - Defines the lifecycle of an automation engine

use serde::{Deserialize, Serialize};

/// Lifecycle states of the automation engine.
///
/// Task-level progress is not modeled here: only one task is ever in
/// flight per session, and its lifecycle lives in the repository and
/// session records. This machine answers "may a task be dispatched?".
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Not started; the only state that accepts a start request.
    Idle,

    /// The main loop is dispatching tasks.
    Running,

    /// Paused at a task boundary; no task is in flight.
    Paused,

    /// A stop was requested or the queue drained; shutting down.
    Stopping,

    /// The run ended; the session record is retained.
    Stopped,

    /// An unrecoverable fault; no dispatch until restarted from idle.
    Error { message: String },
}

impl Default for EngineState {
    fn default() -> Self {
        EngineState::Idle
    }
}

impl EngineState {
    /// Whether no further transitions are expected without a reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Error { .. })
    }

    /// Whether the main loop is live in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused | Self::Stopping)
    }

    /// Short label for events and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(EngineState::default(), EngineState::Idle);
    }

    #[test]
    fn test_terminal_states() {
        assert!(EngineState::Stopped.is_terminal());
        assert!(EngineState::Error {
            message: "boom".into()
        }
        .is_terminal());
        assert!(!EngineState::Running.is_terminal());
    }
}
