//! What each task kind does around its runner call: load the records it
//! needs, call the runner, persist jobs, kits and blobs, build the result.

mod form;
pub mod input;
mod kit;
mod search;

pub use input::{FillInput, KitInput, SearchInput, TaskInput};

use std::sync::Arc;

use applykit_db::{keys, DbError, ObjectStore, Records};
use applykit_types::{Job, Task, TaskKind};
use serde_json::Value;

use crate::error::WorkflowError;
use crate::runner::{RunnerConfig, RunnerError, RunnerInput, RunnerOutput, TaskRunner};

/// Message shown when kit generation has no resume to work from.
pub const NO_RESUME_MESSAGE: &str = "No resume found. Please upload a resume first.";

/// What a successful workflow leaves on its task.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutput {
    pub result: Value,
    /// Blobs written by the run, appended to the task's `blob_keys`.
    pub blob_keys: Vec<String>,
}

/// Shared handles the workflows run against.
#[derive(Clone)]
pub struct Workflows {
    records: Records,
    blobs: Arc<dyn ObjectStore>,
    runner: Arc<dyn TaskRunner>,
    config: RunnerConfig,
}

impl Workflows {
    pub fn new(
        records: Records,
        blobs: Arc<dyn ObjectStore>,
        runner: Arc<dyn TaskRunner>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            records,
            blobs,
            runner,
            config,
        }
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    pub fn blobs(&self) -> &Arc<dyn ObjectStore> {
        &self.blobs
    }

    pub fn runner(&self) -> &Arc<dyn TaskRunner> {
        &self.runner
    }

    /// Run `task`'s workflow to the end. Does not touch the task record.
    pub async fn run(&self, task: &Task) -> Result<WorkflowOutput, WorkflowError> {
        let input = TaskInput::parse(task.kind, &task.input).map_err(WorkflowError::Validation)?;
        match input {
            TaskInput::Search(search) => search::run(self, task, search).await,
            TaskInput::Kit(kit) => kit::run(self, task, kit).await,
            TaskInput::Fill(fill) => form::run(self, task, fill).await,
        }
    }

    async fn call(&self, input: RunnerInput) -> Result<RunnerOutput, WorkflowError> {
        let timeout = self.config.timeout_for(input.kind());
        Ok(self.runner.run(&input, timeout).await?)
    }

    async fn load_job(&self, job_id: &str) -> Result<Job, WorkflowError> {
        self.records
            .get_job(job_id)
            .await?
            .ok_or_else(|| WorkflowError::Validation(format!("job not found: {job_id}")))
    }

    /// The resume to use for `owner`: `explicit` if given, otherwise the
    /// newest upload under the owner's resume prefix.
    pub async fn resolve_resume(
        &self,
        owner: &str,
        explicit: Option<&str>,
    ) -> Result<Option<String>, DbError> {
        if let Some(key) = explicit {
            return Ok(Some(key.to_string()));
        }
        let resumes = self.blobs.list(&keys::resume_prefix(owner)).await?;
        Ok(newest_key(resumes))
    }
}

/// The key with the largest embedded timestamp, falling back to lexical
/// order.
fn newest_key(keys: Vec<String>) -> Option<String> {
    keys.into_iter().max_by(|a, b| {
        keys::timestamp(a)
            .cmp(&keys::timestamp(b))
            .then_with(|| a.cmp(b))
    })
}

fn unexpected_output(kind: TaskKind) -> WorkflowError {
    WorkflowError::Runner(RunnerError::Remote(format!(
        "runner returned the wrong output for {kind}"
    )))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use applykit_db::{BlobMetadata, MemoryObjectStore, MemoryRecordStore, UrlSigner};
    use applykit_types::JobStatus;

    use crate::runner::MockTaskRunner;

    pub fn workflows_with(runner: Arc<dyn TaskRunner>) -> Workflows {
        Workflows::new(
            Records::new(Arc::new(MemoryRecordStore::new())),
            Arc::new(MemoryObjectStore::new(UrlSigner::new(
                "test-secret",
                "http://localhost:8080",
            ))),
            runner,
            RunnerConfig::default(),
        )
    }

    pub fn workflows() -> Workflows {
        workflows_with(Arc::new(MockTaskRunner::new()))
    }

    pub fn job(job_id: &str, owner: &str) -> Job {
        Job {
            job_id: job_id.to_string(),
            user_id: owner.to_string(),
            title: "Rust Engineer".to_string(),
            company: "Ferrous".to_string(),
            location: Some("Remote".to_string()),
            description: "Build reliable services".to_string(),
            url: "https://jobs.example.com/1".to_string(),
            source: "research_api".to_string(),
            status: JobStatus::Found,
            created_at: 1,
            updated_at: 1,
            metadata: Default::default(),
        }
    }

    pub async fn upload_resume(wf: &Workflows, owner: &str, ts: i64, body: &str) -> String {
        wf.blobs()
            .put_blob(
                &keys::resume(owner, ts),
                body.as_bytes().to_vec(),
                "text/plain",
                BlobMetadata::new(),
            )
            .await
            .unwrap()
    }
}
