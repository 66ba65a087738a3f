//! TaskDocument - the parsed form of one specification document

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::id::TaskId;
use super::item::Task;
use super::status::TaskStatus;

/// One parsed specification document and its task tree.
///
/// The document on disk remains the source of truth; this is the
/// repository's in-memory view of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDocument {
    /// Path of the document on disk.
    pub path: PathBuf,

    /// Top-level tasks in document order.
    pub tasks: Vec<Task>,

    /// Total number of lines in the document when parsed.
    pub line_count: usize,
}

impl TaskDocument {
    pub fn new(path: PathBuf, tasks: Vec<Task>, line_count: usize) -> Self {
        Self {
            path,
            tasks,
            line_count,
        }
    }

    /// All tasks and subtasks in ascending identifier order.
    pub fn flatten(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().flat_map(Task::flatten).collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    /// Look up a task or subtask by identifier.
    pub fn find(&self, id: &TaskId) -> Option<&Task> {
        self.flatten().into_iter().find(|task| &task.id == id)
    }

    /// Look up a task or subtask mutably by identifier.
    pub fn find_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        for task in &mut self.tasks {
            if &task.id == id {
                return Some(task);
            }
            for subtask in &mut task.subtasks {
                if &subtask.id == id {
                    return Some(subtask);
                }
            }
        }
        None
    }

    /// Count of tasks with a terminal status.
    pub fn resolved_count(&self) -> usize {
        self.flatten()
            .iter()
            .filter(|task| task.status.is_terminal())
            .count()
    }

    /// Whether every task in the document is terminal.
    pub fn is_all_resolved(&self) -> bool {
        let tasks = self.flatten();
        !tasks.is_empty() && tasks.iter().all(|task| task.status.is_terminal())
    }

    /// Count of tasks still pending.
    pub fn pending_count(&self) -> usize {
        self.flatten()
            .iter()
            .filter(|task| task.status == TaskStatus::Pending)
            .count()
    }
}
