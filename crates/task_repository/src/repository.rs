//! TaskRepository - canonical owner of the task tree
//!
//! The documents on disk stay the source of truth: status updates are
//! written back as a single-marker splice, and external edits are picked
//! up by re-parsing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use automation_core::{Task, TaskDocument, TaskId, TaskStatus};

use crate::discover::{discover, load_document, DiscoveryReport};
use crate::eligibility;
use crate::error::{RepositoryError, Result};
use crate::parser::TASK_LINE;

/// In-memory view over the discovered task documents.
pub struct TaskRepository {
    documents: Vec<TaskDocument>,
}

impl TaskRepository {
    /// Build a repository by discovering documents beneath `roots`.
    ///
    /// Parse failures are returned alongside the repository; they never
    /// abort discovery of the remaining documents.
    pub async fn discover(roots: &[PathBuf]) -> (Self, DiscoveryReport) {
        let mut report = discover(roots).await;
        let documents = std::mem::take(&mut report.documents);
        info!(
            "repository discovered {} documents ({} failures)",
            documents.len(),
            report.failures.len()
        );
        (Self { documents }, report)
    }

    /// Build a repository from already-parsed documents.
    pub fn new(documents: Vec<TaskDocument>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[TaskDocument] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents.iter().all(|doc| doc.tasks.is_empty())
    }

    /// Look up a task by identifier across all documents.
    pub fn find(&self, id: &TaskId) -> Option<&Task> {
        self.documents.iter().find_map(|doc| doc.find(id))
    }

    /// The first eligible pending task across all documents, in
    /// document path order then ascending identifier order.
    pub fn next_eligible(&self, externally_resolved: &HashSet<TaskId>) -> Result<Option<&Task>> {
        for document in &self.documents {
            if let Some(task) = eligibility::next_eligible(document, externally_resolved)? {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    /// Re-parse one tracked document, picking up external edits.
    pub async fn refresh(&mut self, path: &Path) -> Result<()> {
        let position = self
            .documents
            .iter()
            .position(|doc| doc.path == path)
            .ok_or_else(|| RepositoryError::DocumentNotTracked(path.to_path_buf()))?;

        self.documents[position] = load_document(path).await?;
        debug!("refreshed {}", path.display());
        Ok(())
    }

    /// Re-parse every tracked document, keeping the previous view for
    /// any document that no longer loads.
    pub async fn refresh_all(&mut self) -> Vec<(PathBuf, RepositoryError)> {
        let mut failures = Vec::new();
        for index in 0..self.documents.len() {
            let path = self.documents[index].path.clone();
            match load_document(&path).await {
                Ok(document) => self.documents[index] = document,
                Err(error) => failures.push((path, error)),
            }
        }
        failures
    }

    /// Rewrite the status marker of one task, preserving every other
    /// byte of the document.
    ///
    /// Refuses with a conflict error if the recorded line no longer
    /// carries the task's marker (the document changed underneath us).
    pub async fn update_status(&mut self, id: &TaskId, status: TaskStatus) -> Result<()> {
        let (path, line) = {
            let task = self
                .find(id)
                .ok_or_else(|| RepositoryError::TaskNotFound(id.clone()))?;
            (task.location.document.clone(), task.location.line)
        };

        let content = fs::read_to_string(&path).await?;
        let updated = splice_marker(&content, &path, id, line, status)?;

        // Temp file in the same directory so the rename stays atomic.
        let temp = temp_path(&path);
        fs::write(&temp, updated.as_bytes()).await?;
        fs::rename(&temp, &path).await?;

        if let Some(document) = self.documents.iter_mut().find(|doc| doc.path == path) {
            if let Some(task) = document.find_mut(id) {
                task.status = status;
            }
        }

        debug!("updated {} to {:?} in {}", id, status, path.display());
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("tasks.md");
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// Replace the single marker character of the task's recorded line.
fn splice_marker(
    content: &str,
    path: &Path,
    id: &TaskId,
    line_number: usize,
    status: TaskStatus,
) -> Result<String> {
    let conflict = || RepositoryError::StatusConflict {
        document: path.to_path_buf(),
        id: id.clone(),
        line: line_number,
    };

    // Locate the byte range of the recorded line.
    let mut offset = 0usize;
    let mut current = 1usize;
    let mut line_range = None;
    for segment in content.split_inclusive('\n') {
        if current == line_number {
            line_range = Some((offset, offset + segment.len()));
            break;
        }
        offset += segment.len();
        current += 1;
    }
    let (start, end) = line_range.ok_or_else(conflict)?;
    let line = content[start..end].trim_end_matches(['\n', '\r']);

    let captures = TASK_LINE.captures(line).ok_or_else(conflict)?;
    let rest = captures.name("rest").ok_or_else(conflict)?.as_str();
    if !rest_has_id(rest, id) {
        return Err(conflict());
    }

    let marker = captures.name("marker").expect("marker group always set");
    let marker_offset = start + marker.start();

    // The marker group is a single ASCII character, so a byte splice
    // cannot fall inside a UTF-8 sequence.
    let mut updated = String::with_capacity(content.len());
    updated.push_str(&content[..marker_offset]);
    updated.push(status.marker());
    updated.push_str(&content[marker_offset + 1..]);
    Ok(updated)
}

fn rest_has_id(rest: &str, id: &TaskId) -> bool {
    rest.split_whitespace()
        .next()
        .map(|first| first.trim_end_matches('.') == id.to_string())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;
    use tempfile::tempdir;

    const DOCUMENT: &str = "\
# Plan

- [ ] 1. First task
  - Keep this line intact
  - _Requirements: 1.1_
- [ ] 2. Second task
";

    async fn repository_with(content: &str) -> (TaskRepository, PathBuf, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.md");
        tokio::fs::write(&path, content).await.unwrap();
        let document = parse_document(&path, content).unwrap();
        (TaskRepository::new(vec![document]), path, dir)
    }

    #[tokio::test]
    async fn test_update_status_touches_only_the_marker() {
        let (mut repo, path, _dir) = repository_with(DOCUMENT).await;
        let id: TaskId = "1".parse().unwrap();

        repo.update_status(&id, TaskStatus::InProgress).await.unwrap();

        let updated = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(updated, DOCUMENT.replace("- [ ] 1.", "- [-] 1."));
    }

    #[tokio::test]
    async fn test_update_status_round_trips_through_parse() {
        let (mut repo, path, _dir) = repository_with(DOCUMENT).await;
        let id: TaskId = "2".parse().unwrap();

        repo.update_status(&id, TaskStatus::Completed).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let reparsed = parse_document(&path, &content).unwrap();
        assert_eq!(
            reparsed.find(&id).unwrap().status,
            TaskStatus::Completed
        );
        assert_eq!(
            reparsed.find(&"1".parse().unwrap()).unwrap().status,
            TaskStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_conflicting_edit_is_refused() {
        let (mut repo, path, _dir) = repository_with(DOCUMENT).await;

        // The document changes underneath the repository: task 1's line
        // is no longer a marker line.
        let edited = DOCUMENT.replace("- [ ] 1. First task", "First task became prose");
        tokio::fs::write(&path, &edited).await.unwrap();

        let result = repo
            .update_status(&"1".parse().unwrap(), TaskStatus::Completed)
            .await;
        assert!(matches!(
            result,
            Err(RepositoryError::StatusConflict { .. })
        ));

        // The refused write left the document alone.
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, edited);
    }

    #[tokio::test]
    async fn test_unknown_task_is_reported() {
        let (mut repo, _path, _dir) = repository_with(DOCUMENT).await;
        let result = repo
            .update_status(&"9".parse().unwrap(), TaskStatus::Completed)
            .await;
        assert!(matches!(result, Err(RepositoryError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_external_edits() {
        let (mut repo, path, _dir) = repository_with(DOCUMENT).await;

        tokio::fs::write(&path, DOCUMENT.replace("- [ ] 2.", "- [x] 2."))
            .await
            .unwrap();
        repo.refresh(&path).await.unwrap();

        assert_eq!(
            repo.find(&"2".parse().unwrap()).unwrap().status,
            TaskStatus::Completed
        );
    }
}
