//! Cross-cutting notification events
//!
//! The engine reports progress over an mpsc channel instead of global
//! listeners; the host's notification and log surfaces consume it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detection::CompletionDetectionResult;
use crate::task::TaskId;

/// Events emitted by the engine for the host's notification surface.
///
/// Every variant carries enough context (session id, task id, error
/// kind) to reconstruct the occurrence without engine internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutomationEvent {
    SessionStarted {
        session_id: Uuid,
        workspace: String,
    },

    SessionFinished {
        session_id: Uuid,
    },

    StateChanged {
        session_id: Uuid,
        from: String,
        to: String,
    },

    TaskStarted {
        session_id: Uuid,
        task_id: TaskId,
        attempt: u32,
    },

    TaskCompleted {
        session_id: Uuid,
        task_id: TaskId,
        detection: CompletionDetectionResult,
    },

    TaskFailed {
        session_id: Uuid,
        task_id: TaskId,
        error: String,
    },

    TaskSkipped {
        session_id: Uuid,
        task_id: TaskId,
    },

    TaskRetrying {
        session_id: Uuid,
        task_id: TaskId,
        attempt: u32,
        delay_ms: u64,
    },

    EngineError {
        session_id: Uuid,
        kind: String,
        message: String,
    },
}
