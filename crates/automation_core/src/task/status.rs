//! Task execution status

use serde::{Deserialize, Serialize};

/// Status of a task or subtask.
///
/// Only the first three variants are representable as document status
/// markers; `Failed` and `Skipped` are recorded in the session and
/// serialize back to the unchecked marker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    /// Terminal statuses require no further dispatch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Whether this status satisfies a dependency on the task.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    /// The document marker character for this status.
    pub fn marker(&self) -> char {
        match self {
            Self::InProgress => '-',
            Self::Completed => 'x',
            Self::Pending | Self::Failed | Self::Skipped => ' ',
        }
    }

    /// Parse a document marker character.
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            ' ' => Some(Self::Pending),
            '-' => Some(Self::InProgress),
            'x' | 'X' => Some(Self::Completed),
            _ => None,
        }
    }
}
