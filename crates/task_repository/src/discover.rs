//! Document discovery
//!
//! Scans configured locations for task specification documents.
//! Malformed documents are reported as failures without aborting
//! discovery of the others.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use automation_core::TaskDocument;

use crate::error::RepositoryError;
use crate::parser::parse_document;

/// File name recognized as a task specification document.
pub const TASKS_DOCUMENT_NAME: &str = "tasks.md";

/// One document that could not be parsed or read.
#[derive(Debug)]
pub struct DiscoveryFailure {
    pub path: PathBuf,
    pub error: RepositoryError,
}

/// Outcome of a discovery pass: parsed documents in path order plus the
/// failures encountered along the way.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub documents: Vec<TaskDocument>,
    pub failures: Vec<DiscoveryFailure>,
}

impl DiscoveryReport {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.failures.is_empty()
    }
}

/// Discover task documents beneath the given roots.
///
/// A root that is itself a file is taken as a document directly;
/// directories are walked recursively for files named `tasks.md`.
pub async fn discover(roots: &[PathBuf]) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();
    let mut paths: Vec<PathBuf> = Vec::new();

    for root in roots {
        if root.is_file() {
            paths.push(root.clone());
            continue;
        }

        for entry in WalkDir::new(root).follow_links(false) {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file()
                        && entry.file_name().to_str() == Some(TASKS_DOCUMENT_NAME)
                    {
                        paths.push(entry.into_path());
                    }
                }
                Err(error) => {
                    let path = error
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.clone());
                    warn!("discovery skipped {}: {}", path.display(), error);
                    report.failures.push(DiscoveryFailure {
                        path,
                        error: RepositoryError::Io(error.into()),
                    });
                }
            }
        }
    }

    paths.sort();
    paths.dedup();

    for path in paths {
        match load_document(&path).await {
            Ok(document) => {
                debug!(
                    "discovered {} with {} tasks",
                    path.display(),
                    document.flatten().len()
                );
                report.documents.push(document);
            }
            Err(error) => {
                warn!("failed to parse {}: {}", path.display(), error);
                report.failures.push(DiscoveryFailure { path, error });
            }
        }
    }

    report
}

pub(crate) async fn load_document(path: &Path) -> crate::error::Result<TaskDocument> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_document(path, &content)
}
