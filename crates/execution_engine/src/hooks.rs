//! Typed extension points
//!
//! The engine calls exactly three contracts around a task: a prompt
//! builder, the completion probe (see `completion_detector`), and any
//! registered execution hooks. Implementations are registered
//! explicitly on the builder; nothing is loaded from disk.

use async_trait::async_trait;

use automation_core::{CompletionDetectionResult, Task};

/// Builds the prompt submitted to the worker for a task.
pub trait PromptBuilder: Send + Sync {
    fn build(&self, task: &Task) -> String;
}

/// Called before and after each task execution.
#[async_trait]
pub trait ExecutionHook: Send + Sync {
    async fn before_task(&self, _task: &Task) {}

    async fn after_task(&self, _task: &Task, _result: &CompletionDetectionResult) {}
}

/// Default prompt builder: task identifier, title, description and
/// requirement references, phrased for a chat-style worker.
#[derive(Debug, Default)]
pub struct TaskPromptBuilder;

impl PromptBuilder for TaskPromptBuilder {
    fn build(&self, task: &Task) -> String {
        let mut prompt = format!("Execute task {}: {}\n", task.id, task.title);

        if !task.description.is_empty() {
            prompt.push('\n');
            for line in &task.description {
                prompt.push_str("- ");
                prompt.push_str(line);
                prompt.push('\n');
            }
        }

        if !task.requirements.is_empty() {
            prompt.push_str(&format!(
                "\nAddresses requirements: {}\n",
                task.requirements.join(", ")
            ));
        }

        prompt.push_str("\nWork on exactly this task, then report what was done.");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automation_core::{SourceLocation, TaskId};
    use std::path::PathBuf;

    #[test]
    fn test_prompt_carries_id_description_and_requirements() {
        let mut task = Task::new(
            "2.1".parse::<TaskId>().unwrap(),
            "Implement the parser",
            SourceLocation {
                document: PathBuf::from("tasks.md"),
                line: 4,
            },
        );
        task.description.push("Use the fixed line grammar".to_string());
        task.requirements.push("1.2".to_string());

        let prompt = TaskPromptBuilder.build(&task);
        assert!(prompt.contains("task 2.1"));
        assert!(prompt.contains("Implement the parser"));
        assert!(prompt.contains("Use the fixed line grammar"));
        assert!(prompt.contains("requirements: 1.2"));
    }
}
