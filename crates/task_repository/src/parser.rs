//! Specification document parser
//!
//! Recognizes the fixed checkbox line grammar:
//!
//! ```text
//! - [ ] 1. Top-level task          (pending)
//! - [-] 2. In-progress task       (in progress)
//! - [x] 3. Completed task         (completed)
//! - [ ]* 4. Optional task         (optional marker after the status)
//!   - free-form description line
//!   - [ ] 4.1 Subtask, one level deeper
//!   - _Requirements: 1.2, REQ-7_
//!   - _Dependencies: 1, 3_
//! ```
//!
//! Lines beneath a task that do not match the grammar are description
//! text attached to the innermost enclosing task.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use automation_core::{SourceLocation, Task, TaskDocument, TaskId, TaskStatus};

use crate::error::{RepositoryError, Result};

/// Matches a checkbox line and captures indent, status marker, optional
/// marker and the rest of the line.
pub(crate) static TASK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>[ \t]*)- \[(?P<marker>[ xX-])\](?P<optional>\*)?[ \t]+(?P<rest>\S.*)$")
        .expect("task line pattern is valid")
});

/// Splits the task identifier off the title, tolerating a trailing dot
/// after the number (`1. Title` and `1.2 Title` both parse).
static ID_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<id>\d+(?:\.\d+)*)\.?[ \t]+(?P<title>.+)$").expect("id pattern is valid")
});

static REQUIREMENTS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*(?:- )?_Requirements:[ \t]*(?P<refs>.+?)_[ \t]*$")
        .expect("requirements pattern is valid")
});

static DEPENDENCIES_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*(?:- )?_Dependencies:[ \t]*(?P<refs>.+?)_[ \t]*$")
        .expect("dependencies pattern is valid")
});

/// A recognized checkbox line, before tree placement.
struct MarkerLine {
    indent: usize,
    id: TaskId,
    title: String,
    status: TaskStatus,
    optional: bool,
}

fn recognize_marker_line(line: &str) -> Option<MarkerLine> {
    let captures = TASK_LINE.captures(line)?;
    let rest = captures.name("rest")?.as_str();
    let id_captures = ID_TITLE.captures(rest)?;
    let id: TaskId = id_captures.name("id")?.as_str().parse().ok()?;
    let marker = captures.name("marker")?.as_str().chars().next()?;

    Some(MarkerLine {
        indent: captures.name("indent")?.as_str().len(),
        id,
        title: id_captures.name("title")?.as_str().trim_end().to_string(),
        status: TaskStatus::from_marker(marker)?,
        optional: captures.name("optional").is_some(),
    })
}

/// Parse one specification document into a task tree.
///
/// Structural problems (duplicate identifiers, orphan subtasks,
/// dependency errors) fail the whole document; the caller decides
/// whether to continue with other documents.
pub fn parse_document(path: &Path, content: &str) -> Result<TaskDocument> {
    let mut tasks: Vec<Task> = Vec::new();
    let mut seen: HashSet<TaskId> = HashSet::new();
    let mut line_count = 0usize;

    for (index, raw_line) in content.lines().enumerate() {
        let line_number = index + 1;
        line_count = line_number;

        if let Some(marker) = recognize_marker_line(raw_line) {
            place_task(path, &mut tasks, &mut seen, marker, line_number)?;
            continue;
        }

        // Non-marker lines attach to the innermost enclosing task.
        let Some(task) = innermost_task(&mut tasks) else {
            continue;
        };

        if let Some(captures) = REQUIREMENTS_LINE.captures(raw_line) {
            task.requirements.extend(
                split_refs(&captures["refs"]).map(str::to_string),
            );
        } else if let Some(captures) = DEPENDENCIES_LINE.captures(raw_line) {
            for reference in split_refs(&captures["refs"]) {
                let id = reference.parse::<TaskId>().map_err(|_| {
                    RepositoryError::InvalidDependency {
                        document: path.to_path_buf(),
                        line: line_number,
                        reference: reference.to_string(),
                    }
                })?;
                task.depends_on.push(id);
            }
        } else if !raw_line.trim().is_empty() {
            task.description.push(strip_list_prefix(raw_line).to_string());
        }
    }

    let document = TaskDocument::new(path.to_path_buf(), tasks, line_count);
    validate_dependencies(&document)?;
    Ok(document)
}

fn place_task(
    path: &Path,
    tasks: &mut Vec<Task>,
    seen: &mut HashSet<TaskId>,
    marker: MarkerLine,
    line_number: usize,
) -> Result<()> {
    if !seen.insert(marker.id.clone()) {
        return Err(RepositoryError::DuplicateTaskId {
            document: path.to_path_buf(),
            id: marker.id,
            line: line_number,
        });
    }

    let mut task = Task::new(
        marker.id.clone(),
        marker.title,
        SourceLocation {
            document: path.to_path_buf(),
            line: line_number,
        },
    );
    task.status = marker.status;
    task.optional = marker.optional;

    if marker.indent == 0 {
        if marker.id.depth() != 1 {
            // A nested identifier at top level has no parent to attach to.
            return Err(RepositoryError::UnknownParent {
                document: path.to_path_buf(),
                id: marker.id,
                line: line_number,
            });
        }
        tasks.push(task);
        return Ok(());
    }

    let Some(parent) = tasks.last_mut() else {
        return Err(RepositoryError::SubtaskOutsideTask {
            document: path.to_path_buf(),
            line: line_number,
        });
    };

    // Subtasks nest exactly one level below their parent.
    if marker.id.parent().as_ref() != Some(&parent.id) {
        return Err(RepositoryError::UnknownParent {
            document: path.to_path_buf(),
            id: marker.id,
            line: line_number,
        });
    }

    parent.subtasks.push(task);
    Ok(())
}

/// The task a free-form line belongs to: the last subtask of the last
/// task if one exists, otherwise the last task itself.
fn innermost_task(tasks: &mut [Task]) -> Option<&mut Task> {
    let task = tasks.last_mut()?;
    if task.subtasks.is_empty() {
        Some(task)
    } else {
        task.subtasks.last_mut()
    }
}

fn split_refs(refs: &str) -> impl Iterator<Item = &str> {
    refs.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn strip_list_prefix(line: &str) -> &str {
    let trimmed = line.trim_start();
    trimmed.strip_prefix("- ").unwrap_or(trimmed).trim_end()
}

/// Declared dependencies must reference tasks in the same document and
/// must not form a cycle.
fn validate_dependencies(document: &TaskDocument) -> Result<()> {
    let known: HashSet<&TaskId> = document.flatten().iter().map(|t| &t.id).collect();

    for task in document.flatten() {
        for dep in &task.depends_on {
            if !known.contains(dep) {
                return Err(RepositoryError::UnknownDependency {
                    document: document.path.clone(),
                    id: task.id.clone(),
                    depends_on: dep.clone(),
                });
            }
        }
    }

    crate::eligibility::detect_cycles(document)
}
