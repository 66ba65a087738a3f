//! Workspace file watcher
//!
//! Observes a workspace directory and feeds change events to the
//! engine over an async channel. The notify watcher delivers on its own
//! thread, so the engine loop is never blocked by file activity.

use std::path::Path;

use chrono::Utc;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error};

use automation_core::FileChangeEvent;

use crate::error::Result;

/// Watches a workspace and forwards relevant change events.
pub struct WorkspaceWatcher {
    // Dropping the watcher stops the notify backend.
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<FileChangeEvent>,
}

impl WorkspaceWatcher {
    /// Start watching `workspace_path` recursively.
    pub fn new(workspace_path: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<FileChangeEvent>(256);

        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if !is_mutation(&event.kind) {
                        return;
                    }
                    let changed_at = Utc::now();
                    for path in event.paths {
                        // try_send: if the engine is not draining, losing
                        // a change event only delays the signal.
                        let _ = tx.try_send(FileChangeEvent {
                            path,
                            changed_at,
                        });
                    }
                }
                Err(err) => {
                    error!("file watch error: {}", err);
                }
            },
            notify::Config::default(),
        )?;

        watcher.watch(workspace_path, RecursiveMode::Recursive)?;
        debug!("watching {}", workspace_path.display());

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Drain all change events observed since the last call.
    pub fn drain(&mut self) -> Vec<FileChangeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for the next change event; `None` once the watcher stops.
    pub async fn next(&mut self) -> Option<FileChangeEvent> {
        self.rx.recv().await
    }
}

fn is_mutation(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_watcher_observes_file_writes() {
        let dir = tempdir().unwrap();
        let mut watcher = WorkspaceWatcher::new(dir.path()).unwrap();

        tokio::fs::write(dir.path().join("main.rs"), "fn main() {}")
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), watcher.next())
            .await
            .expect("watcher should observe the write within five seconds")
            .expect("watcher channel should stay open");
        assert!(event.path.ends_with("main.rs"));
    }
}
