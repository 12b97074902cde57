// crates/core/src/runner/mod.rs
//! Task runners: the external research and browser-automation calls.
//!
//! [`TaskRunner`] is implemented by [`HttpTaskRunner`] (live APIs) and
//! [`MockTaskRunner`] (canned results), chosen through [`create_runner`].

pub mod config;
pub mod factory;
pub mod http;
pub mod mock;
pub mod types;

pub use config::{RunnerConfig, RunnerMode};
pub use factory::create_runner;
pub use http::HttpTaskRunner;
pub use mock::MockTaskRunner;
pub use types::{
    FillOutcome, FillRequest, JobListing, KitContent, KitRequest, RunnerError, RunnerInput,
    RunnerOutput, Screenshot, SearchRequest,
};

use std::time::Duration;

use async_trait::async_trait;

/// Trait for services that perform the slow part of a task.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Find postings for a query. At most `max_results` are returned.
    async fn search_jobs(&self, request: &SearchRequest) -> Result<Vec<JobListing>, RunnerError>;

    /// Generate a tailored cover letter and resume bullets.
    async fn generate_kit(&self, request: &KitRequest) -> Result<KitContent, RunnerError>;

    /// Drive a browser through an application form.
    async fn fill_form(&self, request: &FillRequest) -> Result<FillOutcome, RunnerError>;

    /// Runner name for logging (e.g. "http", "mock").
    fn name(&self) -> &str;

    /// Run `input` with the matching operation, bounded by `timeout`.
    async fn run(
        &self,
        input: &RunnerInput,
        timeout: Duration,
    ) -> Result<RunnerOutput, RunnerError> {
        let call = async {
            match input {
                RunnerInput::Search(req) => self.search_jobs(req).await.map(RunnerOutput::Listings),
                RunnerInput::Kit(req) => self.generate_kit(req).await.map(RunnerOutput::Kit),
                RunnerInput::Fill(req) => self.fill_form(req).await.map(RunnerOutput::Filled),
            }
        };
        match tokio::time::timeout(timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    runner = self.name(),
                    kind = %input.kind(),
                    timeout_secs = timeout.as_secs(),
                    "runner call timed out"
                );
                Err(RunnerError::Timeout(timeout.as_secs()))
            }
        }
    }
}
