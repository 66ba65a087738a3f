//! Engine events - inputs that drive state transitions

use serde::{Deserialize, Serialize};

/// Events the engine lifecycle reacts to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Start a run from idle.
    StartRequested,

    /// Pause at the next task boundary.
    PauseRequested,

    /// Resume a paused run.
    ResumeRequested,

    /// Stop the run; idempotent, honored from any non-stopped state.
    StopRequested,

    /// No eligible task remains; normal completion.
    QueueDrained,

    /// Shutdown work finished.
    ShutdownComplete,

    /// An unrecoverable fault occurred.
    FatalFault { message: String },

    /// Return a stopped or errored engine to idle.
    Reset,
}

impl EngineEvent {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::StartRequested => "start_requested",
            Self::PauseRequested => "pause_requested",
            Self::ResumeRequested => "resume_requested",
            Self::StopRequested => "stop_requested",
            Self::QueueDrained => "queue_drained",
            Self::ShutdownComplete => "shutdown_complete",
            Self::FatalFault { .. } => "fatal_fault",
            Self::Reset => "reset",
        }
    }
}
