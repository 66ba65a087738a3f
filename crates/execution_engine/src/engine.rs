//! AutomationEngine - the main execution loop
//!
//! Pulls tasks from the repository in identifier order, drives the
//! worker collaborator through one prompt-response cycle per task, and
//! polls the completion probe until a verdict or the task budget runs
//! out. Only one task is ever in flight per session.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, Notify};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use automation_core::{
    AutomationConfig, AutomationEvent, CompletionDetectionResult, CompletionSignals, Task, TaskId,
    TaskStatus, WorkerClient,
};
use completion_detector::{CompletionProbe, WorkspaceWatcher};
use session_manager::{SessionManager, SessionStorage};
use task_repository::TaskRepository;

use crate::error::{EngineError, ErrorClass, Result};
use crate::hooks::{ExecutionHook, PromptBuilder, TaskPromptBuilder};
use crate::machine::{EngineEvent, EngineState, StateMachine};

/// Consecutive repository failures across distinct fetches before the
/// engine concludes the failure is repository-wide.
const MAX_CONSECUTIVE_STRUCTURAL: u32 = 3;

/// External control surface for a running engine.
///
/// All requests are safe to issue from any task; a stop request takes
/// effect within one polling interval, a pause only at a task boundary.
#[derive(Clone)]
pub struct EngineHandle {
    cancel: CancellationToken,
    pause: Arc<AtomicBool>,
    resume: Arc<Notify>,
}

impl EngineHandle {
    /// Request a stop. Idempotent.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    /// Request a pause at the next task boundary.
    pub fn request_pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    /// Resume a paused engine.
    pub fn request_resume(&self) {
        self.pause.store(false, Ordering::SeqCst);
        // notify_one stores a permit, so a resume issued just before
        // the engine starts waiting is not lost.
        self.resume.notify_one();
    }
}

/// Builder wiring the engine's collaborators together.
///
/// Extension points (hooks, prompt builder) are registered here
/// explicitly; there is no dynamic discovery.
pub struct EngineBuilder<S: SessionStorage> {
    repository: TaskRepository,
    probe: Box<dyn CompletionProbe>,
    worker: Arc<dyn WorkerClient>,
    sessions: SessionManager<S>,
    config: AutomationConfig,
    watcher: Option<WorkspaceWatcher>,
    event_tx: Option<mpsc::Sender<AutomationEvent>>,
    prompt_builder: Arc<dyn PromptBuilder>,
    hooks: Vec<Arc<dyn ExecutionHook>>,
}

impl<S: SessionStorage> EngineBuilder<S> {
    pub fn new(
        repository: TaskRepository,
        probe: Box<dyn CompletionProbe>,
        worker: Arc<dyn WorkerClient>,
        sessions: SessionManager<S>,
        config: AutomationConfig,
    ) -> Self {
        Self {
            repository,
            probe,
            worker,
            sessions,
            config,
            watcher: None,
            event_tx: None,
            prompt_builder: Arc::new(TaskPromptBuilder),
            hooks: Vec::new(),
        }
    }

    /// Attach the background file watcher feeding the detector.
    pub fn with_watcher(mut self, watcher: WorkspaceWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Attach the notification channel.
    pub fn with_event_channel(mut self, event_tx: mpsc::Sender<AutomationEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Replace the default prompt builder.
    pub fn with_prompt_builder(mut self, prompt_builder: Arc<dyn PromptBuilder>) -> Self {
        self.prompt_builder = prompt_builder;
        self
    }

    /// Register an execution hook. Hooks run in registration order.
    pub fn with_hook(mut self, hook: Arc<dyn ExecutionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> AutomationEngine<S> {
        let event_tx = self.event_tx.unwrap_or_else(|| {
            // No consumer registered: sends go nowhere.
            let (tx, _rx) = mpsc::channel(1);
            tx
        });

        AutomationEngine {
            repository: self.repository,
            probe: self.probe,
            worker: self.worker,
            sessions: self.sessions,
            config: self.config,
            watcher: self.watcher,
            event_tx,
            prompt_builder: self.prompt_builder,
            hooks: self.hooks,
            machine: StateMachine::new(),
            cancel: CancellationToken::new(),
            pause: Arc::new(AtomicBool::new(false)),
            resume: Arc::new(Notify::new()),
            consecutive_repository_failures: 0,
        }
    }
}

enum LoopOutcome {
    /// No eligible task remains, or stop-on-failure triggered.
    Drained,
    /// A stop request interrupted the run; the session stays resumable.
    StopRequested,
}

/// The automation engine. One instance drives one session.
pub struct AutomationEngine<S: SessionStorage> {
    repository: TaskRepository,
    probe: Box<dyn CompletionProbe>,
    worker: Arc<dyn WorkerClient>,
    sessions: SessionManager<S>,
    config: AutomationConfig,
    watcher: Option<WorkspaceWatcher>,
    event_tx: mpsc::Sender<AutomationEvent>,
    prompt_builder: Arc<dyn PromptBuilder>,
    hooks: Vec<Arc<dyn ExecutionHook>>,
    machine: StateMachine,
    cancel: CancellationToken,
    pause: Arc<AtomicBool>,
    resume: Arc<Notify>,
    consecutive_repository_failures: u32,
}

impl<S: SessionStorage> AutomationEngine<S> {
    /// The control surface for pause/resume/stop requests.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            cancel: self.cancel.clone(),
            pause: self.pause.clone(),
            resume: self.resume.clone(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &EngineState {
        self.machine.state()
    }

    /// The repository view this engine executes against.
    pub fn repository(&self) -> &TaskRepository {
        &self.repository
    }

    /// Run the session to completion, stop, or fatal error.
    ///
    /// An invalid configuration fails here and the engine stays idle.
    pub async fn run(&mut self) -> Result<()> {
        if let Err(config_error) = self.config.validate() {
            let error = EngineError::Config(config_error);
            self.report_error(&error).await;
            return Err(error);
        }

        self.transition(EngineEvent::StartRequested).await;
        let session = self.sessions.session().await;
        info!("[{}] automation session running", session.id);
        self.send(AutomationEvent::SessionStarted {
            session_id: session.id,
            workspace: session.workspace.clone(),
        })
        .await;

        // A resumed session may have left its current task marked
        // in-progress; put it back in the queue before dispatching.
        if let Some(current) = session.current_task.clone() {
            let stale = self
                .repository
                .find(&current)
                .map(|task| task.status == TaskStatus::InProgress)
                .unwrap_or(false);
            if stale {
                info!("[{}] recovering interrupted task {}", session.id, current);
                self.repository
                    .update_status(&current, TaskStatus::Pending)
                    .await?;
            }
        }

        match self.run_loop().await {
            Ok(LoopOutcome::Drained) => {
                self.transition(EngineEvent::QueueDrained).await;
                self.sessions.finish().await?;
                self.transition(EngineEvent::ShutdownComplete).await;
                let session = self.sessions.session().await;
                info!("[{}] automation session finished", session.id);
                self.send(AutomationEvent::SessionFinished {
                    session_id: session.id,
                })
                .await;
                Ok(())
            }
            Ok(LoopOutcome::StopRequested) => {
                self.transition(EngineEvent::StopRequested).await;
                // Leave the session unfinished so a later run resumes it.
                self.sessions.snapshot().await?;
                self.transition(EngineEvent::ShutdownComplete).await;
                let session = self.sessions.session().await;
                info!("[{}] automation session stopped", session.id);
                Ok(())
            }
            Err(error) => {
                error!("automation session failed: {}", error);
                self.report_error(&error).await;
                self.transition(EngineEvent::FatalFault {
                    message: error.to_string(),
                })
                .await;
                let _ = self.sessions.snapshot().await;
                Err(error)
            }
        }
    }

    async fn run_loop(&mut self) -> Result<LoopOutcome> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(LoopOutcome::StopRequested);
            }

            self.sessions
                .snapshot_if_due(self.config.snapshot_interval())
                .await?;

            // Pause applies only here, at a task boundary.
            if self.pause.load(Ordering::SeqCst) {
                self.transition(EngineEvent::PauseRequested).await;
                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(LoopOutcome::StopRequested),
                    _ = self.resume.notified() => {
                        self.transition(EngineEvent::ResumeRequested).await;
                    }
                }
                continue;
            }

            let session = self.sessions.session().await;

            // Pick up external edits at every boundary; a document that
            // stopped parsing keeps its last good view.
            for (path, refresh_error) in self.repository.refresh_all().await {
                warn!(
                    "[{}] stale view kept for {}: {}",
                    session.id,
                    path.display(),
                    refresh_error
                );
            }

            let externally_resolved: HashSet<TaskId> = session
                .failed
                .iter()
                .chain(session.skipped.iter())
                .cloned()
                .collect();

            let task = match self.repository.next_eligible(&externally_resolved) {
                Ok(Some(task)) => task.clone(),
                Ok(None) => return Ok(LoopOutcome::Drained),
                Err(repository_error) => {
                    let error = EngineError::Repository(repository_error);
                    self.consecutive_repository_failures += 1;
                    self.report_error(&error).await;
                    if self.consecutive_repository_failures >= MAX_CONSECUTIVE_STRUCTURAL {
                        return Err(error);
                    }
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Ok(LoopOutcome::StopRequested),
                        _ = tokio::time::sleep(self.config.poll_interval()) => continue,
                    }
                }
            };

            if task.optional && self.config.skip_optional_tasks {
                info!("[{}] skipping optional task {}", session.id, task.id);
                self.sessions.task_skipped(task.id.clone()).await?;
                self.send(AutomationEvent::TaskSkipped {
                    session_id: session.id,
                    task_id: task.id.clone(),
                })
                .await;
                continue;
            }

            match self.execute_with_retries(&task).await {
                // A conflict on the completed-marker write is still a
                // task-local failure, so route it with the others.
                Ok(detection) => match self.finish_task_success(&task, detection).await {
                    Ok(()) => {
                        self.consecutive_repository_failures = 0;
                    }
                    Err(error) if error.class() == ErrorClass::TaskFatal => {
                        if matches!(&error, EngineError::Repository(_)) {
                            self.consecutive_repository_failures += 1;
                            if self.consecutive_repository_failures >= MAX_CONSECUTIVE_STRUCTURAL {
                                return Err(error);
                            }
                        }
                        self.finish_task_failure(&task, &error).await?;
                        if self.config.stop_on_failure {
                            return Ok(LoopOutcome::Drained);
                        }
                    }
                    Err(error) => return Err(error),
                },
                Err(EngineError::Cancelled) => return Ok(LoopOutcome::StopRequested),
                Err(error) if error.class() == ErrorClass::SessionFatal => return Err(error),
                Err(error) => {
                    if matches!(&error, EngineError::Repository(_)) {
                        self.consecutive_repository_failures += 1;
                        if self.consecutive_repository_failures >= MAX_CONSECUTIVE_STRUCTURAL {
                            return Err(error);
                        }
                    } else {
                        self.consecutive_repository_failures = 0;
                    }

                    self.finish_task_failure(&task, &error).await?;

                    if self.config.stop_on_failure {
                        info!(
                            "[{}] stopping on first failure at task {}",
                            session.id, task.id
                        );
                        return Ok(LoopOutcome::Drained);
                    }
                }
            }
        }
    }

    async fn finish_task_success(
        &mut self,
        task: &Task,
        detection: CompletionDetectionResult,
    ) -> Result<()> {
        let session = self.sessions.session().await;
        self.repository
            .update_status(&task.id, TaskStatus::Completed)
            .await?;

        for hook in &self.hooks {
            hook.after_task(task, &detection).await;
        }

        self.sessions.task_completed(task.id.clone()).await?;
        info!(
            "[{}] task {} completed via {:?} (confidence {:.2})",
            session.id, task.id, detection.method, detection.confidence
        );
        self.send(AutomationEvent::TaskCompleted {
            session_id: session.id,
            task_id: task.id.clone(),
            detection,
        })
        .await;
        Ok(())
    }

    async fn finish_task_failure(&mut self, task: &Task, error: &EngineError) -> Result<()> {
        let session = self.sessions.session().await;
        self.report_error(error).await;

        // Optional tasks degrade to skipped instead of failed; they
        // never stop a run.
        let downgrade_to_skip = task.optional;
        let recorded_status = if downgrade_to_skip {
            TaskStatus::Skipped
        } else {
            TaskStatus::Failed
        };

        // The document grammar cannot express failed or skipped; the
        // marker goes back to unchecked and the session keeps the record.
        if let Err(write_error) = self.repository.update_status(&task.id, recorded_status).await {
            warn!(
                "[{}] could not reset marker for {}: {}",
                session.id, task.id, write_error
            );
        }

        if downgrade_to_skip {
            self.sessions.task_skipped(task.id.clone()).await?;
            info!(
                "[{}] optional task {} skipped after failure: {}",
                session.id, task.id, error
            );
            self.send(AutomationEvent::TaskSkipped {
                session_id: session.id,
                task_id: task.id.clone(),
            })
            .await;
        } else {
            self.sessions.task_failed(task.id.clone()).await?;
            warn!("[{}] task {} failed: {}", session.id, task.id, error);
            self.send(AutomationEvent::TaskFailed {
                session_id: session.id,
                task_id: task.id.clone(),
                error: error.to_string(),
            })
            .await;
        }
        Ok(())
    }

    /// Execute one task, retrying transient failures with exponential
    /// backoff up to the configured attempt count.
    async fn execute_with_retries(&mut self, task: &Task) -> Result<CompletionDetectionResult> {
        let session_id = self.sessions.session().await.id;
        let mut attempt: u32 = 0;

        loop {
            match self.execute_once(task, attempt).await {
                Ok(detection) => return Ok(detection),
                Err(error) => {
                    if error.class() != ErrorClass::Transient {
                        return Err(error);
                    }

                    attempt += 1;
                    if attempt >= self.config.max_attempts {
                        debug!(
                            "[{}] task {} exhausted {} attempts",
                            session_id, task.id, self.config.max_attempts
                        );
                        return Err(error);
                    }

                    let delay = self.config.backoff_delay(attempt - 1);
                    info!(
                        "[{}] task {} attempt {} failed ({}); retrying in {:?}",
                        session_id, task.id, attempt, error, delay
                    );
                    self.send(AutomationEvent::TaskRetrying {
                        session_id,
                        task_id: task.id.clone(),
                        attempt: attempt + 1,
                        delay_ms: delay.as_millis() as u64,
                    })
                    .await;

                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(EngineError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// One prompt-response cycle against the worker, polled into the
    /// completion probe until a verdict or the task budget elapses.
    async fn execute_once(
        &mut self,
        task: &Task,
        attempt: u32,
    ) -> Result<CompletionDetectionResult> {
        let session_id = self.sessions.session().await.id;

        for hook in &self.hooks {
            hook.before_task(task).await;
        }

        self.repository
            .update_status(&task.id, TaskStatus::InProgress)
            .await?;
        self.sessions.task_started(task.id.clone()).await?;
        self.send(AutomationEvent::TaskStarted {
            session_id,
            task_id: task.id.clone(),
            attempt: attempt + 1,
        })
        .await;

        if !self.worker.is_available().await {
            return Err(EngineError::Worker(
                automation_core::WorkerError::Unavailable("worker reported unavailable".into()),
            ));
        }

        let prompt = self.prompt_builder.build(task);
        debug!(
            "[{}] submitting task {} ({} chars of prompt)",
            session_id,
            task.id,
            prompt.len()
        );
        let mut stream = self.worker.submit(&prompt).await?;

        self.probe.reset();
        // Stale changes from before this attempt must not count.
        if let Some(watcher) = self.watcher.as_mut() {
            let _ = watcher.drain();
        }

        let cancel = self.cancel.clone();
        let task_timeout = self.config.task_timeout();
        let started = Instant::now();
        let mut response = String::new();
        let mut stream_done = false;

        let mut poll = tokio::time::interval(self.config.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll.reset();

        let probe = self.probe.as_mut();
        let watcher = &mut self.watcher;
        let repository = &self.repository;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),

                chunk = stream.next(), if !stream_done => {
                    match chunk {
                        Some(Ok(chunk)) => response.push_str(&chunk.delta),
                        Some(Err(worker_error)) => return Err(worker_error.into()),
                        None => stream_done = true,
                    }
                }

                _ = poll.tick() => {
                    let elapsed = started.elapsed();
                    let signals = CompletionSignals {
                        response_text: if response.is_empty() {
                            None
                        } else {
                            Some(response.clone())
                        },
                        file_changes: watcher
                            .as_mut()
                            .map(|watcher| watcher.drain())
                            .unwrap_or_default(),
                        explicit_status: repository.find(&task.id).map(|current| current.status),
                    };

                    let verdict = probe.evaluate(task, elapsed, &signals);
                    if verdict.completed {
                        return Ok(verdict);
                    }
                    if elapsed >= task_timeout {
                        return Err(EngineError::TaskTimeout {
                            task_id: task.id.clone(),
                            timeout_ms: task_timeout.as_millis() as u64,
                        });
                    }
                }
            }
        }
    }

    async fn transition(&mut self, event: EngineEvent) {
        let transition = self.machine.handle_event(event);
        if !transition.changed {
            return;
        }
        debug!(
            "engine state {} -> {} on {}",
            transition.from.label(),
            transition.to.label(),
            transition.event.label()
        );

        let session = self.sessions.session().await;
        self.send(AutomationEvent::StateChanged {
            session_id: session.id,
            from: transition.from.label().to_string(),
            to: transition.to.label().to_string(),
        })
        .await;

        // Snapshot on every state transition, per the durability
        // guarantee of losing at most one interval of progress.
        if let Err(persist_error) = self.sessions.snapshot().await {
            warn!("session snapshot failed: {}", persist_error);
        }
    }

    async fn report_error(&self, error: &EngineError) {
        let session = self.sessions.session().await;
        self.send(AutomationEvent::EngineError {
            session_id: session.id,
            kind: error.kind().to_string(),
            message: error.to_string(),
        })
        .await;
    }

    async fn send(&self, event: AutomationEvent) {
        let _ = self.event_tx.send(event).await;
    }
}
