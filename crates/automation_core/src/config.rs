//! Configuration surface consumed by the engine and detector
//!
//! The host owns where these values come from; the core only validates
//! and consumes them. Durations are carried as milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("completion_threshold must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("ambiguity_floor ({floor}) must be below completion_threshold ({threshold})")]
    FloorAboveThreshold { floor: f64, threshold: f64 },

    #[error("min_file_changes must be at least 1")]
    ZeroFileChanges,
}

/// Completion detector thresholds and indicator vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorConfig {
    /// Minimum non-ignored file changes before the file signal counts.
    pub min_file_changes: usize,

    /// Required idle period after the last change, in milliseconds.
    pub quiet_period_ms: u64,

    /// Bounded lookback window for file changes, in milliseconds.
    pub lookback_window_ms: u64,

    /// Confidence at or above which a single signal decides completion.
    pub completion_threshold: f64,

    /// Lower bound of the ambiguous confidence band.
    pub ambiguity_floor: f64,

    /// Time budget for detection before a timeout verdict, in milliseconds.
    pub timeout_ms: u64,

    /// Lexical indicators that raise confidence.
    pub positive_indicators: Vec<String>,

    /// Lexical indicators that lower confidence.
    pub negative_indicators: Vec<String>,

    /// Glob patterns for paths whose changes never count.
    pub ignored_paths: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_file_changes: 1,
            quiet_period_ms: 5_000,
            lookback_window_ms: 30_000,
            completion_threshold: 0.7,
            ambiguity_floor: 0.4,
            timeout_ms: 300_000,
            positive_indicators: [
                "completed",
                "complete",
                "implemented",
                "finished",
                "done",
                "all tests pass",
                "successfully",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            negative_indicators: [
                "failed",
                "error",
                "cannot",
                "unable to",
                "not possible",
                "blocked",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ignored_paths: [
                "**/target/**",
                "**/node_modules/**",
                "**/.git/**",
                "**/dist/**",
                "**/build/**",
                "**/*.lock",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl DetectorConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn lookback_window(&self) -> Duration {
        Duration::from_millis(self.lookback_window_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_file_changes == 0 {
            return Err(ConfigError::ZeroFileChanges);
        }
        if self.quiet_period_ms == 0 {
            return Err(ConfigError::ZeroDuration("quiet_period_ms"));
        }
        if self.lookback_window_ms == 0 {
            return Err(ConfigError::ZeroDuration("lookback_window_ms"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("timeout_ms"));
        }
        if !(self.completion_threshold > 0.0 && self.completion_threshold <= 1.0) {
            return Err(ConfigError::ThresholdOutOfRange(self.completion_threshold));
        }
        if self.ambiguity_floor >= self.completion_threshold {
            return Err(ConfigError::FloorAboveThreshold {
                floor: self.ambiguity_floor,
                threshold: self.completion_threshold,
            });
        }
        Ok(())
    }
}

/// Engine configuration snapshot carried by every session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutomationConfig {
    /// Maximum execution attempts per task, including the first.
    pub max_attempts: u32,

    /// Per-task time budget, in milliseconds.
    pub task_timeout_ms: u64,

    /// Base delay for exponential backoff, in milliseconds.
    pub backoff_base_ms: u64,

    /// Upper bound on the backoff delay, in milliseconds.
    pub backoff_cap_ms: u64,

    /// Detector polling cadence while a task is in flight, in milliseconds.
    pub poll_interval_ms: u64,

    /// Session snapshot cadence, in milliseconds.
    pub snapshot_interval_ms: u64,

    /// Stop the session on the first failed task.
    pub stop_on_failure: bool,

    /// Never dispatch optional tasks; mark them skipped instead.
    pub skip_optional_tasks: bool,

    /// Completion detector settings.
    pub detector: DetectorConfig,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            task_timeout_ms: 300_000,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 60_000,
            poll_interval_ms: 1_000,
            snapshot_interval_ms: 30_000,
            stop_on_failure: false,
            skip_optional_tasks: false,
            detector: DetectorConfig::default(),
        }
    }
}

impl AutomationConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }

    /// The backoff delay before the given retry attempt (1-based).
    ///
    /// `base × 2^attempt`, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(31);
        let delay = self
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_cap_ms);
        Duration::from_millis(delay)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.task_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("task_timeout_ms"));
        }
        if self.backoff_base_ms == 0 {
            return Err(ConfigError::ZeroDuration("backoff_base_ms"));
        }
        if self.backoff_cap_ms == 0 {
            return Err(ConfigError::ZeroDuration("backoff_cap_ms"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("poll_interval_ms"));
        }
        if self.snapshot_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("snapshot_interval_ms"));
        }
        self.detector.validate()
    }
}
