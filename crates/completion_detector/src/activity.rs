//! File-change activity tracking
//!
//! Keeps a rolling history of observed file changes inside a bounded
//! lookback window. The signal fires once enough non-ignored changes
//! have accumulated AND the workspace has been quiet for the configured
//! period.

use std::collections::VecDeque;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::trace;

use automation_core::{DetectorConfig, FileChangeEvent};

use crate::error::{DetectorError, Result};

/// Confidence contributed by a satisfied file-activity signal.
pub const FILE_ACTIVITY_WEIGHT: f64 = 0.75;

/// What the file-activity signal concluded for one evaluation.
#[derive(Debug, Clone)]
pub struct ActivityAssessment {
    /// Whether the change-count and quiet-period conditions both hold.
    pub satisfied: bool,

    /// Non-ignored changes currently inside the lookback window.
    pub change_count: usize,

    /// Milliseconds since the most recent non-ignored change, if any.
    pub idle_ms: Option<i64>,
}

/// Rolling window of file-change events.
pub struct FileActivityTracker {
    min_file_changes: usize,
    quiet_period: ChronoDuration,
    lookback_window: ChronoDuration,
    ignored: GlobSet,
    changes: VecDeque<FileChangeEvent>,
}

impl FileActivityTracker {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignored_paths {
            let glob = Glob::new(pattern).map_err(|source| DetectorError::IgnorePattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let ignored = builder
            .build()
            .map_err(|source| DetectorError::IgnorePattern {
                pattern: config.ignored_paths.join(", "),
                source,
            })?;

        Ok(Self {
            min_file_changes: config.min_file_changes,
            quiet_period: ChronoDuration::milliseconds(config.quiet_period_ms as i64),
            lookback_window: ChronoDuration::milliseconds(config.lookback_window_ms as i64),
            ignored,
            changes: VecDeque::new(),
        })
    }

    /// Record one observed change. Ignored paths do not count.
    pub fn record(&mut self, event: FileChangeEvent) {
        if self.ignored.is_match(&event.path) {
            trace!("ignoring change to {}", event.path.display());
            return;
        }
        self.changes.push_back(event);
    }

    /// Assess the signal at `now`, rolling off stale entries first.
    pub fn assess(&mut self, now: DateTime<Utc>) -> ActivityAssessment {
        let horizon = now - self.lookback_window;
        while self
            .changes
            .front()
            .map(|event| event.changed_at < horizon)
            .unwrap_or(false)
        {
            self.changes.pop_front();
        }

        let change_count = self.changes.len();
        let idle_ms = self
            .changes
            .iter()
            .map(|event| event.changed_at)
            .max()
            .map(|latest| (now - latest).num_milliseconds());

        let satisfied = change_count >= self.min_file_changes
            && idle_ms
                .map(|idle| idle >= self.quiet_period.num_milliseconds())
                .unwrap_or(false);

        ActivityAssessment {
            satisfied,
            change_count,
            idle_ms,
        }
    }

    /// Drop all recorded history, e.g. between tasks.
    pub fn clear(&mut self) {
        self.changes.clear();
    }
}
