//! Session Manager service

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use automation_core::{AutomationConfig, AutomationSession, TaskId};

use crate::error::Result;
use crate::storage::SessionStorage;

/// Owns the live session record and persists every mutation, so a
/// crash loses at most one snapshot interval of progress.
pub struct SessionManager<S: SessionStorage> {
    storage: Arc<S>,
    current: Arc<RwLock<AutomationSession>>,
    last_snapshot: Arc<RwLock<Instant>>,
}

impl<S: SessionStorage> SessionManager<S> {
    /// Resume the workspace's unfinished session if one exists,
    /// otherwise start a fresh one.
    pub async fn resume_or_start(
        storage: S,
        workspace: &str,
        config: AutomationConfig,
    ) -> Result<Self> {
        let storage = Arc::new(storage);

        let session = match storage.find_unfinished(workspace).await? {
            Some(existing) => {
                info!(
                    "[{}] resuming unfinished session for workspace {}",
                    existing.id, workspace
                );
                existing
            }
            None => {
                let fresh = AutomationSession::new(workspace, config);
                info!("[{}] starting session for workspace {}", fresh.id, workspace);
                storage.save_session(&fresh).await?;
                fresh
            }
        };

        Ok(Self {
            storage,
            current: Arc::new(RwLock::new(session)),
            last_snapshot: Arc::new(RwLock::new(Instant::now())),
        })
    }

    /// Get a copy of the current session record.
    pub async fn session(&self) -> AutomationSession {
        self.current.read().await.clone()
    }

    /// Record that a task entered execution.
    pub async fn task_started(&self, id: TaskId) -> Result<()> {
        let mut session = self.current.write().await;
        session.task_started(id);
        self.persist(&session).await
    }

    /// Record a completed task.
    pub async fn task_completed(&self, id: TaskId) -> Result<()> {
        let mut session = self.current.write().await;
        session.task_completed(id);
        self.persist(&session).await
    }

    /// Record a failed task.
    pub async fn task_failed(&self, id: TaskId) -> Result<()> {
        let mut session = self.current.write().await;
        session.task_failed(id);
        self.persist(&session).await
    }

    /// Record a skipped task.
    pub async fn task_skipped(&self, id: TaskId) -> Result<()> {
        let mut session = self.current.write().await;
        session.task_skipped(id);
        self.persist(&session).await
    }

    /// Mark the session finished and persist the final record.
    pub async fn finish(&self) -> Result<()> {
        let mut session = self.current.write().await;
        session.finish();
        self.persist(&session).await
    }

    /// Persist the current record unconditionally.
    pub async fn snapshot(&self) -> Result<()> {
        let session = self.current.read().await;
        self.persist(&session).await
    }

    /// Persist the current record if the interval has elapsed since the
    /// last write. Called from the engine loop on its own cadence.
    pub async fn snapshot_if_due(&self, interval: Duration) -> Result<()> {
        let due = {
            let last = self.last_snapshot.read().await;
            last.elapsed() >= interval
        };
        if due {
            self.snapshot().await?;
        }
        Ok(())
    }

    async fn persist(&self, session: &AutomationSession) -> Result<()> {
        self.storage.save_session(session).await?;
        *self.last_snapshot.write().await = Instant::now();
        debug!("[{}] session snapshot persisted", session.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileSessionStorage;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_resume_or_start_creates_a_session() {
        let dir = tempdir().unwrap();
        let storage = FileSessionStorage::new(dir.path());
        let manager =
            SessionManager::resume_or_start(storage, "ws", AutomationConfig::default())
                .await
                .unwrap();

        let session = manager.session().await;
        assert_eq!(session.workspace, "ws");
        assert!(!session.finished);
    }

    #[tokio::test]
    async fn test_task_records_are_persisted() {
        let dir = tempdir().unwrap();
        let storage = FileSessionStorage::new(dir.path());
        let manager =
            SessionManager::resume_or_start(storage.clone(), "ws", AutomationConfig::default())
                .await
                .unwrap();

        let id: TaskId = "1.2".parse().unwrap();
        manager.task_started(id.clone()).await.unwrap();
        manager.task_completed(id.clone()).await.unwrap();

        let session_id = manager.session().await.id;
        let loaded = storage.load_session(session_id).await.unwrap();
        assert_eq!(loaded.completed, vec![id]);
        assert_eq!(loaded.current_task, None);
    }

    #[tokio::test]
    async fn test_unfinished_session_is_resumed() {
        let dir = tempdir().unwrap();
        let storage = FileSessionStorage::new(dir.path());

        let first_id = {
            let manager = SessionManager::resume_or_start(
                storage.clone(),
                "ws",
                AutomationConfig::default(),
            )
            .await
            .unwrap();
            manager.task_completed("1".parse().unwrap()).await.unwrap();
            manager.session().await.id
        };

        // A new manager for the same workspace picks up the run.
        let manager =
            SessionManager::resume_or_start(storage, "ws", AutomationConfig::default())
                .await
                .unwrap();
        let session = manager.session().await;
        assert_eq!(session.id, first_id);
        assert_eq!(session.completed.len(), 1);
    }

    #[tokio::test]
    async fn test_finished_session_is_not_resumed() {
        let dir = tempdir().unwrap();
        let storage = FileSessionStorage::new(dir.path());

        let first_id = {
            let manager = SessionManager::resume_or_start(
                storage.clone(),
                "ws",
                AutomationConfig::default(),
            )
            .await
            .unwrap();
            manager.finish().await.unwrap();
            manager.session().await.id
        };

        let manager =
            SessionManager::resume_or_start(storage, "ws", AutomationConfig::default())
                .await
                .unwrap();
        assert_ne!(manager.session().await.id, first_id);
    }
}
