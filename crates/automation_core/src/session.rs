//! AutomationSession - the durable record of one engine run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AutomationConfig;
use crate::task::TaskId;

/// Durable record of one continuous engine run.
///
/// Created when the engine leaves `idle`; mutated on every task
/// transition; retained after the engine reaches `stopped`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSession {
    /// Unique session identifier.
    pub id: Uuid,

    /// Key of the workspace this session drives. Sessions never share a
    /// workspace with another live session.
    pub workspace: String,

    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// Identifier of the task currently in flight, if any.
    pub current_task: Option<TaskId>,

    /// Tasks completed so far, in completion order.
    pub completed: Vec<TaskId>,

    /// Tasks that exhausted their attempts, in failure order.
    pub failed: Vec<TaskId>,

    /// Optional tasks skipped instead of failed.
    pub skipped: Vec<TaskId>,

    /// Snapshot of the configuration in effect for this run.
    pub config: AutomationConfig,

    /// Whether the engine reached `stopped` for this session.
    pub finished: bool,

    /// When the session finished, if it did.
    pub finished_at: Option<DateTime<Utc>>,
}

impl AutomationSession {
    pub fn new(workspace: impl Into<String>, config: AutomationConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace: workspace.into(),
            started_at: Utc::now(),
            current_task: None,
            completed: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            config,
            finished: false,
            finished_at: None,
        }
    }

    /// Record that a task entered execution.
    pub fn task_started(&mut self, id: TaskId) {
        self.current_task = Some(id);
    }

    /// Record a completed task and clear the cursor.
    pub fn task_completed(&mut self, id: TaskId) {
        self.clear_cursor(&id);
        self.completed.push(id);
    }

    /// Record a failed task and clear the cursor.
    pub fn task_failed(&mut self, id: TaskId) {
        self.clear_cursor(&id);
        self.failed.push(id);
    }

    /// Record a skipped task and clear the cursor.
    pub fn task_skipped(&mut self, id: TaskId) {
        self.clear_cursor(&id);
        self.skipped.push(id);
    }

    /// Mark the session finished.
    pub fn finish(&mut self) {
        self.current_task = None;
        self.finished = true;
        self.finished_at = Some(Utc::now());
    }

    /// Whether the given task already has a terminal record here.
    pub fn is_recorded(&self, id: &TaskId) -> bool {
        self.completed.contains(id) || self.failed.contains(id) || self.skipped.contains(id)
    }

    fn clear_cursor(&mut self, id: &TaskId) {
        if self.current_task.as_ref() == Some(id) {
            self.current_task = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_transitions_maintain_cursor() {
        let mut session = AutomationSession::new("ws", AutomationConfig::default());
        let id: TaskId = "1.2".parse().unwrap();

        session.task_started(id.clone());
        assert_eq!(session.current_task, Some(id.clone()));

        session.task_completed(id.clone());
        assert_eq!(session.current_task, None);
        assert!(session.is_recorded(&id));
    }

    #[test]
    fn test_finish_is_terminal() {
        let mut session = AutomationSession::new("ws", AutomationConfig::default());
        session.task_started("1".parse().unwrap());
        session.finish();

        assert!(session.finished);
        assert!(session.finished_at.is_some());
        assert_eq!(session.current_task, None);
    }
}
