//! completion_detector - Did the worker actually finish the task?
//!
//! The worker collaborator never says "done" reliably, so completion is
//! inferred from weak signals:
//! - lexical indicators in the streamed response text (`indicators`)
//! - file-change activity followed by a quiet period (`activity`)
//! - an explicit completed status already on the task
//!
//! `detector` combines the signals under an OR-of-strong-evidence
//! policy with a conservative ambiguity band; `watcher` feeds file
//! events from the workspace without blocking the engine loop.

pub mod activity;
pub mod detector;
pub mod error;
pub mod indicators;
pub mod watcher;

pub use activity::FileActivityTracker;
pub use detector::{CompletionDetector, CompletionProbe};
pub use error::{DetectorError, Result};
pub use indicators::IndicatorMatcher;
pub use watcher::WorkspaceWatcher;
