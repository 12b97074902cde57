// crates/core/src/lifecycle.rs
//! Task lifecycle manager.
//!
//! Owns every status change of a task after creation. Each transition is a
//! conditional write on the status it was validated against, so two writers
//! racing on one task cannot both succeed.

use std::time::{Duration, Instant};

use applykit_db::{FieldUpdate, Records};
use applykit_types::{unix_now, Task, TaskKind, TaskStatus};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::TaskError;
use crate::metrics;
use crate::worker::TaskQueue;
use crate::workflows::{TaskInput, Workflows};

/// How a freshly created task gets run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Run inline; the caller waits for the terminal status.
    Synchronous,
    /// Hand the task to the worker queue and return while it is `pending`.
    Deferred,
}

/// Fields written alongside a status change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionPayload {
    pub result: Option<Value>,
    pub error_message: Option<String>,
    /// Appended to the task's existing blob references.
    pub blob_keys: Vec<String>,
}

impl TransitionPayload {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn completed(result: Value, blob_keys: Vec<String>) -> Self {
        Self {
            result: Some(result),
            error_message: None,
            blob_keys,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error_message: Some(message.into()),
            blob_keys: Vec::new(),
        }
    }

    fn check(&self, to: TaskStatus) -> Result<(), String> {
        match to {
            TaskStatus::Completed => {
                if self.result.is_none() {
                    return Err("a completed task needs a result".into());
                }
                if self.error_message.is_some() {
                    return Err("a completed task cannot carry an error message".into());
                }
            }
            TaskStatus::Failed => {
                if self.error_message.as_deref().map_or(true, |m| m.trim().is_empty()) {
                    return Err("a failed task needs an error message".into());
                }
                if self.result.is_some() {
                    return Err("a failed task cannot carry a result".into());
                }
            }
            TaskStatus::Pending | TaskStatus::Processing => {
                if self.result.is_some() || self.error_message.is_some() || !self.blob_keys.is_empty()
                {
                    return Err(format!("no payload allowed when moving to {to}"));
                }
            }
        }
        Ok(())
    }
}

pub struct TaskManager {
    workflows: Workflows,
    queue: TaskQueue,
}

impl TaskManager {
    pub fn new(workflows: Workflows, queue: TaskQueue) -> Self {
        Self { workflows, queue }
    }

    pub fn records(&self) -> &Records {
        self.workflows.records()
    }

    pub fn workflows(&self) -> &Workflows {
        &self.workflows
    }

    /// Validate `input` for `kind` and store a new `pending` task.
    pub async fn create(&self, kind: TaskKind, owner: &str, input: Value) -> Result<Task, TaskError> {
        if owner.trim().is_empty() {
            return Err(TaskError::Validation("owner is required".into()));
        }
        let parsed = TaskInput::parse(kind, &input).map_err(TaskError::Validation)?;
        let mut task = Task::new(kind, owner, parsed.to_value(), unix_now());
        if let Some(job_id) = parsed.job_id() {
            task = task.with_job_id(job_id);
        }
        self.records().put_task(&task).await.map_err(TaskError::Store)?;
        metrics::record_transition(kind, TaskStatus::Pending);
        info!(task_id = %task.task_id, kind = %kind, owner, "task created");
        Ok(task)
    }

    /// Start `task` in `mode`. Synchronous dispatch returns the task in its
    /// terminal status; deferred dispatch returns it unchanged.
    ///
    /// A deferred task the queue refuses stays `pending`.
    pub async fn dispatch(&self, task: &Task, mode: DispatchMode) -> Result<Task, TaskError> {
        match mode {
            DispatchMode::Synchronous => self.run_task(&task.task_id, false).await,
            DispatchMode::Deferred => {
                self.queue.enqueue(&task.task_id)?;
                debug!(task_id = %task.task_id, "task queued");
                Ok(task.clone())
            }
        }
    }

    /// [`create`](Self::create) then [`dispatch`](Self::dispatch).
    pub async fn submit(
        &self,
        kind: TaskKind,
        owner: &str,
        input: Value,
        mode: DispatchMode,
    ) -> Result<Task, TaskError> {
        let task = self.create(kind, owner, input).await?;
        self.dispatch(&task, mode).await
    }

    /// The task record as stored.
    pub async fn poll(&self, task_id: &str) -> Result<Task, TaskError> {
        self.records()
            .get_task(task_id)
            .await
            .map_err(TaskError::Store)?
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }

    /// Move a task to `to`, writing `payload` in the same update.
    pub async fn transition(
        &self,
        task_id: &str,
        to: TaskStatus,
        payload: TransitionPayload,
    ) -> Result<Task, TaskError> {
        let current = self.poll(task_id).await?;
        if !current.status.can_transition_to(to) {
            warn!(task_id, from = %current.status, to = %to, "rejected task transition");
            return Err(TaskError::InvalidTransition {
                task_id: task_id.to_string(),
                from: current.status,
                to,
            });
        }
        payload.check(to).map_err(TaskError::Validation)?;

        let now = unix_now();
        let mut updates = vec![
            FieldUpdate::set("status", to.as_str()),
            FieldUpdate::set("updated_at", now),
        ];
        if to.is_terminal() {
            updates.push(FieldUpdate::set("completed_at", now));
        }
        if let Some(result) = payload.result {
            updates.push(FieldUpdate::set("result", result));
        }
        if let Some(message) = payload.error_message {
            updates.push(FieldUpdate::set("error_message", message));
        }
        if !payload.blob_keys.is_empty() {
            let mut blob_keys = current.blob_keys.clone();
            blob_keys.extend(payload.blob_keys);
            updates.push(FieldUpdate::set("blob_keys", json!(blob_keys)));
        }

        let task = self
            .records()
            .update_task(task_id, current.status, &updates)
            .await
            .map_err(|e| TaskError::from_store(task_id, e))?;
        metrics::record_transition(task.kind, to);
        info!(task_id, kind = %task.kind, from = %current.status, to = %to, "task transitioned");
        Ok(task)
    }

    /// Worker entry point: move the task to `processing`, run it, record the
    /// outcome. Terminal tasks are returned untouched.
    pub async fn execute(&self, task_id: &str) -> Result<Task, TaskError> {
        let outcome = self.run_task(task_id, true).await;
        self.queue.release(task_id);
        outcome
    }

    async fn run_task(&self, task_id: &str, mark_processing: bool) -> Result<Task, TaskError> {
        let mut task = self.poll(task_id).await?;
        if task.is_terminal() {
            debug!(task_id, status = %task.status, "task already finished, skipping");
            return Ok(task);
        }
        if mark_processing {
            if task.status == TaskStatus::Processing {
                warn!(task_id, "task already processing, skipping redelivery");
                return Ok(task);
            }
            task = self
                .transition(task_id, TaskStatus::Processing, TransitionPayload::none())
                .await?;
        }

        let started = Instant::now();
        let (status, payload) = match self.workflows.run(&task).await {
            Ok(output) => (
                TaskStatus::Completed,
                TransitionPayload::completed(output.result, output.blob_keys),
            ),
            Err(e) => {
                warn!(task_id, kind = %task.kind, error = %e, "task workflow failed");
                (TaskStatus::Failed, TransitionPayload::failed(e.to_string()))
            }
        };
        metrics::record_execution(task.kind, status, started.elapsed());
        self.transition(task_id, status, payload).await
    }

    /// Fail every `pending` or `processing` task whose last update is older
    /// than `max_age`. Returns how many were failed.
    ///
    /// Pending tasks still waiting in this manager's queue are left alone;
    /// their age counts from when a worker marks them `processing`.
    pub async fn reap_stale(&self, max_age: Duration) -> Result<usize, TaskError> {
        let cutoff = unix_now() - max_age.as_secs() as i64;
        let message = format!(
            "task abandoned: no progress for {} seconds",
            max_age.as_secs()
        );
        let mut reaped = 0;
        for status in [TaskStatus::Pending, TaskStatus::Processing] {
            let candidates = self
                .records()
                .tasks_with_status(status)
                .await
                .map_err(TaskError::Store)?;
            let stale = candidates.into_iter().filter(|t| {
                t.updated_at < cutoff
                    && !(t.status == TaskStatus::Pending && self.queue.is_waiting(&t.task_id))
            });
            for task in stale {
                match self
                    .transition(&task.task_id, TaskStatus::Failed, TransitionPayload::failed(&message))
                    .await
                {
                    Ok(_) => reaped += 1,
                    Err(TaskError::Conflict(_)) | Err(TaskError::InvalidTransition { .. }) => {
                        debug!(task_id = %task.task_id, "task moved on before it was reaped");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        if reaped > 0 {
            warn!(count = reaped, max_age_secs = max_age.as_secs(), "reaped stale tasks");
            metrics::record_reaped(reaped);
        }
        Ok(reaped)
    }
}
