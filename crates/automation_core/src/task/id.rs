//! Hierarchical task identifiers
//!
//! Identifiers are dot-separated integers (`2.3`). Ordering is
//! segment-wise numeric, so `1.2 < 1.10 < 2`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskIdError {
    #[error("empty task identifier")]
    Empty,

    #[error("invalid task identifier segment: {0}")]
    InvalidSegment(String),
}

/// Hierarchical task identifier, e.g. `2.3`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    segments: Vec<u32>,
}

impl TaskId {
    pub fn new(segments: Vec<u32>) -> Result<Self, TaskIdError> {
        if segments.is_empty() {
            return Err(TaskIdError::Empty);
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Number of segments (1 for a top-level task, 2 for a subtask).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The parent identifier, if any (`2.3` -> `2`).
    pub fn parent(&self) -> Option<TaskId> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Whether `self` is a strict prefix-ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &TaskId) -> bool {
        other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// The last segment, used for sibling ordering.
    pub fn last_segment(&self) -> u32 {
        *self.segments.last().expect("TaskId is never empty")
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.segments.iter().map(u32::to_string).collect();
        write!(f, "{}", rendered.join("."))
    }
}

impl FromStr for TaskId {
    type Err = TaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TaskIdError::Empty);
        }

        let segments = trimmed
            .split('.')
            .map(|segment| {
                segment
                    .parse::<u32>()
                    .map_err(|_| TaskIdError::InvalidSegment(segment.to_string()))
            })
            .collect::<Result<Vec<u32>, TaskIdError>>()?;

        Self::new(segments)
    }
}

impl TryFrom<String> for TaskId {
    type Error = TaskIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}
