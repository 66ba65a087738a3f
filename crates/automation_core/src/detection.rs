//! Completion detection values and signals
//!
//! A detection result is produced fresh on every evaluation attempt and
//! never mutated, only superseded by the next attempt.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskStatus;

/// How a completion verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Lexical indicators in the worker's response text.
    ResponseIndicator,

    /// Recent file-change activity followed by a quiet period.
    FileActivity,

    /// The task already carried a completed status.
    ExplicitStatus,

    /// More than one signal crossed the confidence threshold.
    Combined,

    /// The time budget elapsed before any signal crossed the threshold.
    Timeout,

    /// No signal produced usable evidence.
    None,
}

/// A single observed file change, fed to the detector by the watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeEvent {
    pub path: PathBuf,
    pub changed_at: DateTime<Utc>,
}

/// Observation signals available for one evaluation attempt.
///
/// All fields are optional; an empty set of signals is valid and yields
/// a negative verdict (or a timeout once the budget elapses).
#[derive(Debug, Clone, Default)]
pub struct CompletionSignals {
    /// Accumulated worker response text, possibly partial.
    pub response_text: Option<String>,

    /// File changes observed since the previous evaluation attempt.
    pub file_changes: Vec<FileChangeEvent>,

    /// Status already recorded on the task, if any.
    pub explicit_status: Option<TaskStatus>,
}

impl CompletionSignals {
    pub fn is_empty(&self) -> bool {
        self.response_text.is_none() && self.file_changes.is_empty() && self.explicit_status.is_none()
    }
}

/// A confidence-scored completion verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionDetectionResult {
    /// Whether the task is considered finished.
    pub completed: bool,

    /// Confidence in [0, 1].
    pub confidence: f64,

    /// The detection method that produced the verdict.
    pub method: DetectionMethod,

    /// Human-readable indicator strings that contributed.
    pub indicators: Vec<String>,

    /// When the verdict was produced.
    pub detected_at: DateTime<Utc>,

    /// Optional free-form context.
    pub context: Option<String>,
}

impl CompletionDetectionResult {
    pub fn new(completed: bool, confidence: f64, method: DetectionMethod) -> Self {
        Self {
            completed,
            confidence: confidence.clamp(0.0, 1.0),
            method,
            indicators: Vec::new(),
            detected_at: Utc::now(),
            context: None,
        }
    }

    /// A negative verdict carrying no evidence.
    pub fn negative() -> Self {
        Self::new(false, 0.0, DetectionMethod::None)
    }

    /// A negative verdict because the time budget elapsed.
    pub fn timed_out() -> Self {
        Self::new(false, 0.0, DetectionMethod::Timeout)
    }

    pub fn with_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.indicators.push(indicator.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        let result = CompletionDetectionResult::new(true, 1.7, DetectionMethod::Combined);
        assert_eq!(result.confidence, 1.0);

        let result = CompletionDetectionResult::new(false, -0.2, DetectionMethod::None);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_timed_out_sets_method() {
        let result = CompletionDetectionResult::timed_out();
        assert!(!result.completed);
        assert_eq!(result.method, DetectionMethod::Timeout);
    }
}
