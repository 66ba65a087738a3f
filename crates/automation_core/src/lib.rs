//! automation_core - Core types and traits for the task automation engine
//!
//! This crate is the bottom of the workspace dependency graph. It provides:
//! - The task tree parsed from specification documents (`task`)
//! - The durable session record (`session`)
//! - Completion detection values and signals (`detection`)
//! - The consumed configuration surface (`config`)
//! - The worker collaborator interface (`worker`)
//! - Cross-cutting notification events (`events`)

pub mod config;
pub mod detection;
pub mod events;
pub mod session;
pub mod task;
pub mod worker;

// Re-export commonly used types
pub use config::{AutomationConfig, ConfigError, DetectorConfig};
pub use detection::{
    CompletionDetectionResult, CompletionSignals, DetectionMethod, FileChangeEvent,
};
pub use events::AutomationEvent;
pub use session::AutomationSession;
pub use task::{SourceLocation, Task, TaskDocument, TaskId, TaskIdError, TaskStatus};
pub use worker::{WorkerChunk, WorkerClient, WorkerError, WorkerStream};
