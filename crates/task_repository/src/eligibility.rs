//! Task eligibility and ordering
//!
//! Tasks are offered strictly in ascending hierarchical-identifier
//! order. A pending task becomes eligible once its dependencies are
//! resolved: the declared ones when a `_Dependencies: …_` line exists,
//! otherwise every lower-numbered sibling and every ancestor.

use std::collections::{HashMap, HashSet};

use automation_core::{Task, TaskDocument, TaskId, TaskStatus};

use crate::error::{RepositoryError, Result};

/// Return the first eligible pending task of the document, if any.
///
/// `externally_resolved` carries task ids the session has already
/// recorded as failed or skipped: those tasks are not offered again and
/// count as resolved for dependency purposes, so a failed task does not
/// wedge the rest of the queue.
pub fn next_eligible<'a>(
    document: &'a TaskDocument,
    externally_resolved: &HashSet<TaskId>,
) -> Result<Option<&'a Task>> {
    detect_cycles(document)?;

    let ordered = document.flatten();
    let by_id: HashMap<&TaskId, &Task> = ordered.iter().map(|task| (&task.id, *task)).collect();

    let resolved = |id: &TaskId| -> bool {
        externally_resolved.contains(id)
            || by_id
                .get(id)
                .map(|task| task.status.is_resolved())
                .unwrap_or(false)
    };

    for task in ordered.iter().copied() {
        if externally_resolved.contains(&task.id) {
            continue;
        }
        if task.status != TaskStatus::Pending {
            continue;
        }

        let eligible = if task.depends_on.is_empty() {
            default_dependencies(task, &by_id).iter().all(|id| resolved(id))
        } else {
            task.depends_on.iter().all(|id| resolved(id))
        };

        if eligible {
            return Ok(Some(task));
        }
    }

    Ok(None)
}

/// The default dependency set: lower-numbered siblings at every level
/// of the task's ancestry, plus the ancestors themselves.
fn default_dependencies(task: &Task, by_id: &HashMap<&TaskId, &Task>) -> Vec<TaskId> {
    let mut dependencies = Vec::new();
    let mut current = task.id.clone();

    loop {
        let parent = current.parent();
        for sibling in 1..current.last_segment() {
            let mut segments = parent
                .as_ref()
                .map(|p| p.segments().to_vec())
                .unwrap_or_default();
            segments.push(sibling);
            if let Ok(id) = TaskId::new(segments) {
                if by_id.contains_key(&id) {
                    dependencies.push(id);
                }
            }
        }

        match parent {
            Some(parent_id) => {
                if by_id.contains_key(&parent_id) {
                    dependencies.push(parent_id.clone());
                }
                current = parent_id;
            }
            None => break,
        }
    }

    dependencies
}

/// Detect cycles in the declared dependency graph.
///
/// Reported as a structural error so the engine never spins on a
/// document that can make no progress.
pub fn detect_cycles(document: &TaskDocument) -> Result<()> {
    let tasks = document.flatten();
    let by_id: HashMap<&TaskId, &Task> = tasks.iter().map(|task| (&task.id, *task)).collect();

    let mut finished: HashSet<&TaskId> = HashSet::new();

    for task in tasks.iter().copied() {
        if finished.contains(&task.id) {
            continue;
        }
        let mut path: Vec<&TaskId> = Vec::new();
        visit(task, &by_id, &mut path, &mut finished, document)?;
    }

    Ok(())
}

fn visit<'a>(
    task: &'a Task,
    by_id: &HashMap<&'a TaskId, &'a Task>,
    path: &mut Vec<&'a TaskId>,
    finished: &mut HashSet<&'a TaskId>,
    document: &TaskDocument,
) -> Result<()> {
    if finished.contains(&task.id) {
        return Ok(());
    }
    if let Some(position) = path.iter().position(|id| **id == task.id) {
        let mut cycle: Vec<TaskId> = path[position..].iter().map(|id| (*id).clone()).collect();
        cycle.push(task.id.clone());
        return Err(RepositoryError::DependencyCycle {
            document: document.path.clone(),
            cycle,
        });
    }

    path.push(&task.id);
    for dep in &task.depends_on {
        if let Some(next) = by_id.get(dep).copied() {
            visit(next, by_id, path, finished, document)?;
        }
    }
    path.pop();
    finished.insert(&task.id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;
    use std::path::PathBuf;

    fn parse(content: &str) -> TaskDocument {
        parse_document(&PathBuf::from("tasks.md"), content).unwrap()
    }

    fn next_id(document: &TaskDocument, resolved: &HashSet<TaskId>) -> Option<String> {
        next_eligible(document, resolved)
            .unwrap()
            .map(|task| task.id.to_string())
    }

    #[test]
    fn test_first_pending_task_is_offered_first() {
        let document = parse("- [ ] 1. One\n- [ ] 2. Two\n");
        assert_eq!(next_id(&document, &HashSet::new()), Some("1".into()));
    }

    #[test]
    fn test_document_order_does_not_override_identifier_order() {
        // Task 2 listed first after an external edit.
        let document = parse("- [ ] 2. Two\n- [ ] 1. One\n");
        assert_eq!(next_id(&document, &HashSet::new()), Some("1".into()));
    }

    #[test]
    fn test_parent_is_offered_before_its_subtasks() {
        let document = parse("- [ ] 1. Parent\n  - [ ] 1.1 Child\n");
        assert_eq!(next_id(&document, &HashSet::new()), Some("1".into()));
    }

    #[test]
    fn test_subtask_waits_for_lower_numbered_sibling() {
        let document = parse(
            "- [x] 1. Parent\n  - [ ] 1.1 First\n  - [ ] 1.2 Second\n",
        );
        assert_eq!(next_id(&document, &HashSet::new()), Some("1.1".into()));
    }

    #[test]
    fn test_skipped_sibling_unblocks_successor() {
        let document = parse("- [ ] 1. One\n- [ ] 2. Two\n");
        let resolved: HashSet<TaskId> = ["1".parse().unwrap()].into_iter().collect();
        assert_eq!(next_id(&document, &resolved), Some("2".into()));
    }

    #[test]
    fn test_declared_dependencies_replace_the_default_rule() {
        // 2 waits on 3, 3 waits on 2 by the default rule, but 2.1 only
        // declares a dependency on the completed task 1: it is eligible
        // even though its parent is not resolved yet.
        let content = "- [x] 1. One\n- [ ] 2. Two\n  - _Dependencies: 3_\n  - [ ] 2.1 Sub\n    - _Dependencies: 1_\n- [ ] 3. Three\n";
        let document = parse(content);
        assert_eq!(next_id(&document, &HashSet::new()), Some("2.1".into()));
    }

    #[test]
    fn test_cycle_left_by_an_external_edit_is_reported() {
        // Parse-time validation catches cycles in fresh documents, so
        // stitch one in the way a post-discovery mutation could.
        let mut document = parse("- [ ] 1. One\n- [ ] 2. Two\n");
        document.tasks[0].depends_on.push("2".parse().unwrap());
        document.tasks[1].depends_on.push("1".parse().unwrap());

        assert!(matches!(
            next_eligible(&document, &HashSet::new()),
            Err(RepositoryError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn test_forward_dependency_defers_a_task() {
        let document = parse(
            "- [ ] 1. One\n  - _Dependencies: 2_\n- [ ] 2. Two\n",
        );
        // Task 2's default rule waits on task 1, task 1 waits on 2:
        // nothing is eligible, but the call terminates.
        assert_eq!(next_id(&document, &HashSet::new()), None);
    }

    #[test]
    fn test_all_resolved_yields_none() {
        let document = parse("- [x] 1. One\n- [x] 2. Two\n");
        assert_eq!(next_id(&document, &HashSet::new()), None);
    }
}
