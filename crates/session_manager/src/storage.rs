//! Session storage trait and implementations

use crate::error::{Result, SessionError};
use async_trait::async_trait;
use automation_core::AutomationSession;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Session storage trait
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Load a session by id
    async fn load_session(&self, session_id: Uuid) -> Result<AutomationSession>;

    /// Save a session
    async fn save_session(&self, session: &AutomationSession) -> Result<()>;

    /// Check if a session exists
    async fn session_exists(&self, session_id: Uuid) -> bool;

    /// Delete a session
    async fn delete_session(&self, session_id: Uuid) -> Result<()>;

    /// List every stored session
    async fn list_sessions(&self) -> Result<Vec<AutomationSession>>;

    /// The most recent unfinished session for a workspace, if any
    async fn find_unfinished(&self, workspace: &str) -> Result<Option<AutomationSession>> {
        let mut candidates: Vec<AutomationSession> = self
            .list_sessions()
            .await?
            .into_iter()
            .filter(|session| !session.finished && session.workspace == workspace)
            .collect();
        candidates.sort_by_key(|session| session.started_at);
        Ok(candidates.pop())
    }
}

/// File-based session storage, one JSON document per session
#[derive(Clone)]
pub struct FileSessionStorage {
    base_path: PathBuf,
}

impl FileSessionStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn session_path(&self, session_id: Uuid) -> PathBuf {
        self.base_path.join(format!("{}.json", session_id))
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn load_session(&self, session_id: Uuid) -> Result<AutomationSession> {
        let path = self.session_path(session_id);

        if !path.exists() {
            return Err(SessionError::NotFound);
        }

        let contents = fs::read_to_string(&path).await?;
        let session: AutomationSession = serde_json::from_str(&contents)?;

        Ok(session)
    }

    async fn save_session(&self, session: &AutomationSession) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;

        let path = self.session_path(session.id);
        let contents = serde_json::to_string_pretty(session)?;

        fs::write(&path, contents).await?;

        Ok(())
    }

    async fn session_exists(&self, session_id: Uuid) -> bool {
        self.session_path(session_id).exists()
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        let path = self.session_path(session_id);

        if path.exists() {
            fs::remove_file(&path).await?;
        }

        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<AutomationSession>> {
        let mut sessions = Vec::new();

        if !self.base_path.exists() {
            return Ok(sessions);
        }

        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let contents = fs::read_to_string(&path).await?;
            match serde_json::from_str::<AutomationSession>(&contents) {
                Ok(session) => sessions.push(session),
                Err(error) => {
                    tracing::warn!("skipping unreadable session {}: {}", path.display(), error);
                }
            }
        }

        Ok(sessions)
    }
}
