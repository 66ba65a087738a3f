//! Worker collaborator interface
//!
//! The worker is the external, slow, non-deterministic executor that a
//! host connects to the engine. Only the interface lives here; test
//! suites provide scripted implementations.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("worker unavailable: {0}")]
    Unavailable(String),

    #[error("workspace not authorized for automation: {0}")]
    PermissionDenied(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("worker API error: {0}")]
    Api(String),
}

impl WorkerError {
    /// Permission and trust errors are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;

/// One fragment of a streamed worker response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerChunk {
    /// Text appended to the response so far.
    pub delta: String,
}

impl WorkerChunk {
    pub fn new(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
        }
    }
}

pub type WorkerStream = Pin<Box<dyn Stream<Item = Result<WorkerChunk>> + Send>>;

/// The chat-style collaborator that performs the actual task work.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Submit a prompt and obtain the streamed response.
    ///
    /// The stream may emit partial text; consumers accumulate it and
    /// feed it to the completion detector incrementally.
    async fn submit(&self, prompt: &str) -> Result<WorkerStream>;

    /// Whether the collaborator is currently reachable.
    async fn is_available(&self) -> bool;
}
