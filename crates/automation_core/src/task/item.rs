//! Task - unit of work parsed from a specification document

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::id::TaskId;
use super::status::TaskStatus;

/// Where a task's status marker line lives in its source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Path of the specification document.
    pub document: PathBuf,

    /// 1-based line number of the status marker line.
    pub line: usize,
}

/// A unit of work parsed from a specification document.
///
/// Subtasks share the same shape, one nesting level only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Hierarchical identifier, e.g. `2.3`.
    pub id: TaskId,

    /// Title taken from the marker line.
    pub title: String,

    /// Free-text description lines beneath the marker line.
    pub description: Vec<String>,

    /// Subtasks nested one level deeper.
    pub subtasks: Vec<Task>,

    /// Opaque requirement references from a `_Requirements: …_` line.
    pub requirements: Vec<String>,

    /// Declared dependencies from a `_Dependencies: …_` line.
    /// When empty, the default ordering rule applies.
    pub depends_on: Vec<TaskId>,

    /// Current status.
    pub status: TaskStatus,

    /// Whether the task is optional (`*` after the status marker).
    pub optional: bool,

    /// Location of the marker line for status rewrites.
    pub location: SourceLocation,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            id,
            title: title.into(),
            description: Vec::new(),
            subtasks: Vec::new(),
            requirements: Vec::new(),
            depends_on: Vec::new(),
            status: TaskStatus::Pending,
            optional: false,
            location,
        }
    }

    /// Whether this task has its own subtasks.
    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }

    /// The task and its subtasks in ascending identifier order.
    ///
    /// Identifier ordering places a parent before its subtasks, so this
    /// is a plain pre-order walk.
    pub fn flatten(&self) -> Vec<&Task> {
        let mut tasks = vec![self];
        for subtask in &self.subtasks {
            tasks.push(subtask);
        }
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(line: usize) -> SourceLocation {
        SourceLocation {
            document: PathBuf::from("tasks.md"),
            line,
        }
    }

    #[test]
    fn test_flatten_lists_parent_before_subtasks() {
        let mut task = Task::new("2".parse().unwrap(), "Parent", location(1));
        task.subtasks
            .push(Task::new("2.1".parse().unwrap(), "Child", location(2)));

        let ids: Vec<String> = task.flatten().iter().map(|t| t.id.to_string()).collect();
        assert_eq!(ids, vec!["2", "2.1"]);
    }
}
