//! Repository error types

use std::path::PathBuf;

use automation_core::TaskId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}:{}: duplicate task identifier {}", .document.display(), .line, .id)]
    DuplicateTaskId {
        document: PathBuf,
        id: TaskId,
        line: usize,
    },

    #[error("{}:{}: task {} has no parent task in this document", .document.display(), .line, .id)]
    UnknownParent {
        document: PathBuf,
        id: TaskId,
        line: usize,
    },

    #[error("{}:{}: subtask marker outside any top-level task", .document.display(), .line)]
    SubtaskOutsideTask { document: PathBuf, line: usize },

    #[error("{}:{}: dependency reference {:?} is not a task identifier", .document.display(), .line, .reference)]
    InvalidDependency {
        document: PathBuf,
        line: usize,
        reference: String,
    },

    #[error("{}: task {} depends on unknown task {}", .document.display(), .id, .depends_on)]
    UnknownDependency {
        document: PathBuf,
        id: TaskId,
        depends_on: TaskId,
    },

    #[error("{}: dependency cycle through {}", .document.display(), cycle_display(.cycle))]
    DependencyCycle {
        document: PathBuf,
        cycle: Vec<TaskId>,
    },

    #[error("{}:{}: status line for task {} changed underneath the repository", .document.display(), .line, .id)]
    StatusConflict {
        document: PathBuf,
        id: TaskId,
        line: usize,
    },

    #[error("task {0} not found in any discovered document")]
    TaskNotFound(TaskId),

    #[error("document not tracked by this repository: {}", .0.display())]
    DocumentNotTracked(PathBuf),
}

impl RepositoryError {
    /// Structural errors describe a malformed or inconsistent document;
    /// they are recoverable per document.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTaskId { .. }
                | Self::UnknownParent { .. }
                | Self::SubtaskOutsideTask { .. }
                | Self::InvalidDependency { .. }
                | Self::UnknownDependency { .. }
                | Self::DependencyCycle { .. }
        )
    }

    /// Conflicts mean the document changed under a pending write; they
    /// are fatal to the current task only.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::StatusConflict { .. })
    }
}

fn cycle_display(cycle: &[TaskId]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
