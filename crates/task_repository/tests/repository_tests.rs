//! Integration tests for document round-trips and eligibility

use std::collections::HashSet;
use std::path::PathBuf;

use automation_core::{TaskId, TaskStatus};
use task_repository::{discover, parse_document, TaskRepository};

const FIXTURE: &str = "\
# Implementation Plan

Some prose the parser must leave untouched (notes, links, unicode: äöü).

- [ ] 1. Set up the workspace
  - Create the crate layout
  - _Requirements: 1.1, 1.2_
- [-] 2. Build the parser
  - [x] 2.1 Line grammar
  - [ ] 2.2 Error reporting
    - Collect structural errors per document
  - _Requirements: 2.3_
- [ ]* 3. Optional cleanup pass

Trailing prose stays too.
";

async fn write_fixture(content: &str) -> (PathBuf, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.md");
    tokio::fs::write(&path, content).await.unwrap();
    (path, dir)
}

#[tokio::test]
async fn test_noop_status_rewrite_is_byte_identical() {
    let (path, _dir) = write_fixture(FIXTURE).await;
    let document = parse_document(&path, FIXTURE).unwrap();
    let mut repository = TaskRepository::new(vec![document]);

    // Rewriting every task with its current status must not change a
    // single byte of the document.
    for (id, status) in [
        ("1", TaskStatus::Pending),
        ("2", TaskStatus::InProgress),
        ("2.1", TaskStatus::Completed),
        ("2.2", TaskStatus::Pending),
        ("3", TaskStatus::Pending),
    ] {
        repository
            .update_status(&id.parse().unwrap(), status)
            .await
            .unwrap();
    }

    let content = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(content, FIXTURE);
}

#[tokio::test]
async fn test_status_rewrite_preserves_every_other_field() {
    let (path, _dir) = write_fixture(FIXTURE).await;
    let document = parse_document(&path, FIXTURE).unwrap();
    let mut repository = TaskRepository::new(vec![document]);

    let id: TaskId = "2.2".parse().unwrap();
    repository
        .update_status(&id, TaskStatus::Completed)
        .await
        .unwrap();

    let content = tokio::fs::read_to_string(&path).await.unwrap();
    let reparsed = parse_document(&path, &content).unwrap();

    // The one marker changed...
    assert_eq!(reparsed.find(&id).unwrap().status, TaskStatus::Completed);
    // ...and everything else round-tripped.
    assert_eq!(content, FIXTURE.replace("- [ ] 2.2", "- [x] 2.2"));
    let task = reparsed.find(&"2.2".parse().unwrap()).unwrap();
    assert_eq!(task.description, vec!["Collect structural errors per document"]);
    assert_eq!(task.requirements, vec!["2.3"]);
    let optional = reparsed.find(&"3".parse().unwrap()).unwrap();
    assert!(optional.optional);
}

#[tokio::test]
async fn test_optional_marker_survives_status_rewrite() {
    let (path, _dir) = write_fixture(FIXTURE).await;
    let document = parse_document(&path, FIXTURE).unwrap();
    let mut repository = TaskRepository::new(vec![document]);

    let id: TaskId = "3".parse().unwrap();
    repository
        .update_status(&id, TaskStatus::Completed)
        .await
        .unwrap();

    let content = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(content.contains("- [x]* 3. Optional cleanup pass"));
}

#[tokio::test]
async fn test_discovered_repository_offers_tasks_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("specs");
    tokio::fs::create_dir_all(&nested).await.unwrap();
    tokio::fs::write(nested.join("tasks.md"), FIXTURE).await.unwrap();

    let (repository, report) = TaskRepository::discover(&[dir.path().to_path_buf()]).await;
    assert!(report.failures.is_empty());
    assert_eq!(repository.documents().len(), 1);

    // 1 is pending, 2 is already in progress (not pending), so 1 wins.
    let next = repository.next_eligible(&HashSet::new()).unwrap().unwrap();
    assert_eq!(next.id.to_string(), "1");
}

#[tokio::test]
async fn test_discover_reports_failures_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good");
    let bad = dir.path().join("bad");
    tokio::fs::create_dir_all(&good).await.unwrap();
    tokio::fs::create_dir_all(&bad).await.unwrap();
    tokio::fs::write(good.join("tasks.md"), "- [ ] 1. Fine\n")
        .await
        .unwrap();
    tokio::fs::write(bad.join("tasks.md"), "- [ ] 3.9 No parent\n")
        .await
        .unwrap();

    let report = discover(&[dir.path().to_path_buf()]).await;
    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.is_structural());
}
