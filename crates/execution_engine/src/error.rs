//! Engine error taxonomy and classification
//!
//! Per-task errors never crash the engine; classification decides
//! whether a failure is retried with backoff, ends the current task, or
//! ends the whole session.

use automation_core::{ConfigError, TaskId, WorkerError};
use completion_detector::DetectorError;
use session_manager::SessionError;
use task_repository::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),

    #[error("task {task_id} produced no completion signal within {timeout_ms}ms")]
    TaskTimeout { task_id: TaskId, timeout_ms: u64 },

    #[error("stop requested")]
    Cancelled,
}

/// How a failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry the task with backoff.
    Transient,

    /// Fail the current task; the engine continues.
    TaskFatal,

    /// End the session; no retry.
    SessionFatal,
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            // Worker trust errors are fatal immediately, everything
            // else from the worker is retried.
            Self::Worker(error) if error.is_fatal() => ErrorClass::SessionFatal,
            Self::Worker(_) => ErrorClass::Transient,

            // No completion signal in budget is a retryable failure.
            Self::TaskTimeout { .. } => ErrorClass::Transient,

            // Structural and conflict errors end the current task only;
            // recurrence across tasks is tracked by the engine itself.
            Self::Repository(error) if error.is_structural() || error.is_conflict() => {
                ErrorClass::TaskFatal
            }
            Self::Repository(_) => ErrorClass::Transient,

            // Losing durability or running on an invalid configuration
            // is never retried.
            Self::Session(_) => ErrorClass::SessionFatal,
            Self::Config(_) => ErrorClass::SessionFatal,
            Self::Detector(_) => ErrorClass::SessionFatal,

            Self::Cancelled => ErrorClass::SessionFatal,
        }
    }

    /// Short kind label for notification events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Repository(error) if error.is_conflict() => "conflict",
            Self::Repository(error) if error.is_structural() => "structural",
            Self::Repository(_) => "repository",
            Self::Worker(error) if error.is_fatal() => "permission",
            Self::Worker(_) => "worker_unavailable",
            Self::Session(_) => "session",
            Self::Config(_) => "configuration",
            Self::Detector(_) => "detector",
            Self::TaskTimeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
