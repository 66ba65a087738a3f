//! Completion detection
//!
//! Combines the available signals under an OR-of-strong-evidence
//! policy: any single signal at or above the completion threshold
//! decides completion on its own; absence of other signals never
//! dilutes a strong one. Mid-band confidence is deliberately downgraded
//! to "not completed" so the queue never advances past unfinished work.

use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use automation_core::{
    CompletionDetectionResult, CompletionSignals, DetectionMethod, DetectorConfig, Task,
    TaskStatus,
};

use crate::activity::{FileActivityTracker, FILE_ACTIVITY_WEIGHT};
use crate::error::Result;
use crate::indicators::IndicatorMatcher;

/// Indicator string appended when a verdict falls into the ambiguous
/// confidence band.
pub const AMBIGUOUS_INDICATOR: &str = "ambiguous signal, needs verification";

/// The detection seam the engine polls.
///
/// Implementations must be repeatedly callable without side effects
/// beyond their own bookkeeping of recent file-change history.
pub trait CompletionProbe: Send + Sync {
    fn evaluate(
        &mut self,
        task: &Task,
        elapsed: Duration,
        signals: &CompletionSignals,
    ) -> CompletionDetectionResult;

    /// Forget per-task bookkeeping at a task boundary.
    fn reset(&mut self) {}
}

/// One scored signal, before combination.
struct SignalVerdict {
    method: DetectionMethod,
    confidence: f64,
    indicators: Vec<String>,
}

/// The default multi-signal detector.
pub struct CompletionDetector {
    config: DetectorConfig,
    matcher: IndicatorMatcher,
    activity: FileActivityTracker,
}

impl CompletionDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        let matcher =
            IndicatorMatcher::new(&config.positive_indicators, &config.negative_indicators)?;
        let activity = FileActivityTracker::new(&config)?;
        Ok(Self {
            config,
            matcher,
            activity,
        })
    }

    fn collect_signals(&mut self, task: &Task, signals: &CompletionSignals) -> Vec<SignalVerdict> {
        let mut verdicts = Vec::new();

        // Explicit status is binary and unconditional.
        let explicit = signals.explicit_status.unwrap_or(task.status);
        if explicit == TaskStatus::Completed {
            verdicts.push(SignalVerdict {
                method: DetectionMethod::ExplicitStatus,
                confidence: 1.0,
                indicators: vec!["task already marked completed".to_string()],
            });
        }

        if let Some(response) = signals.response_text.as_deref() {
            if !response.is_empty() {
                let score = self.matcher.score(response);
                verdicts.push(SignalVerdict {
                    method: DetectionMethod::ResponseIndicator,
                    confidence: score.confidence,
                    indicators: score.matched,
                });
            }
        }

        for change in &signals.file_changes {
            self.activity.record(change.clone());
        }
        let assessment = self.activity.assess(Utc::now());
        if assessment.change_count > 0 {
            let confidence = if assessment.satisfied {
                FILE_ACTIVITY_WEIGHT
            } else {
                0.0
            };
            let mut indicators = vec![format!(
                "{} file change(s) in lookback window",
                assessment.change_count
            )];
            if let Some(idle) = assessment.idle_ms {
                indicators.push(format!("{idle}ms since last change"));
            }
            verdicts.push(SignalVerdict {
                method: DetectionMethod::FileActivity,
                confidence,
                indicators,
            });
        }

        verdicts
    }
}

impl CompletionProbe for CompletionDetector {
    fn reset(&mut self) {
        self.activity.clear();
    }

    fn evaluate(
        &mut self,
        task: &Task,
        elapsed: Duration,
        signals: &CompletionSignals,
    ) -> CompletionDetectionResult {
        let verdicts = self.collect_signals(task, signals);

        let strong: Vec<&SignalVerdict> = verdicts
            .iter()
            .filter(|verdict| verdict.confidence >= self.config.completion_threshold)
            .collect();

        if !strong.is_empty() {
            // Any one strong signal completes; more than one is
            // reported as combined evidence.
            let confidence = strong
                .iter()
                .map(|verdict| verdict.confidence)
                .fold(0.0, f64::max);
            let method = if strong.len() > 1 {
                DetectionMethod::Combined
            } else {
                strong[0].method
            };
            let mut result = CompletionDetectionResult::new(true, confidence, method);
            for verdict in &verdicts {
                result.indicators.extend(verdict.indicators.iter().cloned());
            }
            debug!(
                "task {} detected complete via {:?} ({:.2})",
                task.id, method, confidence
            );
            return result;
        }

        let best = verdicts.iter().max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let best_confidence = best.map(|verdict| verdict.confidence).unwrap_or(0.0);

        if best_confidence >= self.config.ambiguity_floor {
            // Conservative bias: a mid-band verdict is never completion.
            let method = best.map(|verdict| verdict.method).unwrap_or(DetectionMethod::None);
            let mut result = CompletionDetectionResult::new(false, best_confidence, method);
            for verdict in &verdicts {
                result.indicators.extend(verdict.indicators.iter().cloned());
            }
            result.indicators.push(AMBIGUOUS_INDICATOR.to_string());
            return result;
        }

        if elapsed >= self.config.timeout() {
            debug!("task {} detection timed out after {:?}", task.id, elapsed);
            return CompletionDetectionResult::timed_out()
                .with_context(format!("no completion signal within {elapsed:?}"));
        }

        let mut result =
            CompletionDetectionResult::new(false, best_confidence, DetectionMethod::None);
        for verdict in &verdicts {
            result.indicators.extend(verdict.indicators.iter().cloned());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automation_core::{FileChangeEvent, SourceLocation, TaskId};
    use chrono::Duration as ChronoDuration;
    use std::path::PathBuf;

    fn task(status: TaskStatus) -> Task {
        let mut task = Task::new(
            "1".parse::<TaskId>().unwrap(),
            "Implement the parser",
            SourceLocation {
                document: PathBuf::from("tasks.md"),
                line: 1,
            },
        );
        task.status = status;
        task
    }

    fn detector() -> CompletionDetector {
        CompletionDetector::new(DetectorConfig::default()).unwrap()
    }

    #[test]
    fn test_explicit_completed_status_is_unconditional() {
        let mut detector = detector();
        let signals = CompletionSignals {
            response_text: Some("everything failed with an error".to_string()),
            ..Default::default()
        };

        let result = detector.evaluate(
            &task(TaskStatus::Completed),
            Duration::from_secs(1),
            &signals,
        );
        assert!(result.completed);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.method, DetectionMethod::ExplicitStatus);
    }

    #[test]
    fn test_strong_response_signal_completes() {
        let mut detector = detector();
        let signals = CompletionSignals {
            response_text: Some(
                "The feature is implemented.\n```rust\nfn a() {}\n```\n```rust\nfn b() {}\n```"
                    .to_string(),
            ),
            ..Default::default()
        };

        let result = detector.evaluate(
            &task(TaskStatus::InProgress),
            Duration::from_secs(1),
            &signals,
        );
        assert!(result.completed);
        assert!(result.confidence >= 0.6);
        assert!(matches!(
            result.method,
            DetectionMethod::ResponseIndicator | DetectionMethod::Combined
        ));
    }

    #[test]
    fn test_midband_confidence_is_downgraded() {
        let mut detector = detector();
        // A single positive indicator alone lands in [0.4, 0.7).
        let signals = CompletionSignals {
            response_text: Some("The change is implemented".to_string()),
            ..Default::default()
        };

        let result = detector.evaluate(
            &task(TaskStatus::InProgress),
            Duration::from_secs(1),
            &signals,
        );
        assert!(!result.completed);
        assert!(result.confidence >= 0.4 && result.confidence < 0.7);
        assert!(result
            .indicators
            .iter()
            .any(|indicator| indicator == AMBIGUOUS_INDICATOR));
    }

    #[test]
    fn test_no_signals_before_timeout_yields_timeout_method() {
        let config = DetectorConfig {
            timeout_ms: 5_000,
            ..Default::default()
        };
        let mut detector = CompletionDetector::new(config).unwrap();

        let result = detector.evaluate(
            &task(TaskStatus::InProgress),
            Duration::from_millis(5_000),
            &CompletionSignals::default(),
        );
        assert!(!result.completed);
        assert_eq!(result.method, DetectionMethod::Timeout);
    }

    #[test]
    fn test_quiet_file_activity_completes() {
        let mut detector = detector();
        let signals = CompletionSignals {
            file_changes: vec![FileChangeEvent {
                path: PathBuf::from("src/parser.rs"),
                changed_at: Utc::now() - ChronoDuration::seconds(10),
            }],
            ..Default::default()
        };

        let result = detector.evaluate(
            &task(TaskStatus::InProgress),
            Duration::from_secs(12),
            &signals,
        );
        assert!(result.completed);
        assert_eq!(result.method, DetectionMethod::FileActivity);
        assert!(result.confidence >= 0.7);
    }

    #[test]
    fn test_busy_file_activity_does_not_complete() {
        let mut detector = detector();
        // A change observed this instant means the quiet period has not
        // elapsed yet.
        let signals = CompletionSignals {
            file_changes: vec![FileChangeEvent {
                path: PathBuf::from("src/parser.rs"),
                changed_at: Utc::now(),
            }],
            ..Default::default()
        };

        let result = detector.evaluate(
            &task(TaskStatus::InProgress),
            Duration::from_secs(1),
            &signals,
        );
        assert!(!result.completed);
    }

    #[test]
    fn test_weak_negative_evidence_stays_below_the_band() {
        let mut detector = detector();
        let signals = CompletionSignals {
            response_text: Some("I cannot continue, the build failed".to_string()),
            ..Default::default()
        };

        let result = detector.evaluate(
            &task(TaskStatus::InProgress),
            Duration::from_secs(1),
            &signals,
        );
        assert!(!result.completed);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, DetectionMethod::None);
    }
}
