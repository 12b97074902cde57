// crates/core/src/runner/types.rs
//! Request/response/error types for task runners.

use std::collections::BTreeMap;

use applykit_types::{Job, TaskKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Find job postings matching a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub location: Option<String>,
    pub max_results: usize,
}

/// One posting as reported by the research service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    #[serde(default = "untitled")]
    pub title: String,
    #[serde(default = "unknown_company")]
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<String>,
}

fn untitled() -> String {
    "Untitled".to_string()
}

fn unknown_company() -> String {
    "Unknown".to_string()
}

/// Generate a cover letter and resume bullets for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct KitRequest {
    pub job: Job,
    pub resume_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitContent {
    pub cover_letter: String,
    #[serde(default)]
    pub resume_bullets: Vec<String>,
}

/// Fill a web application form.
#[derive(Debug, Clone, PartialEq)]
pub struct FillRequest {
    pub application_url: String,
    pub form_data: BTreeMap<String, String>,
    /// Click submit. When false the automation stops on the submit button.
    pub submit: bool,
}

/// A screenshot captured during form filling.
#[derive(Debug, Clone, PartialEq)]
pub struct Screenshot {
    /// Step name, e.g. `before_submit`.
    pub step: String,
    /// Base64-encoded PNG.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillOutcome {
    pub session_id: Option<String>,
    pub status: String,
    pub filled_fields: BTreeMap<String, String>,
    pub screenshots: Vec<Screenshot>,
    pub final_url: Option<String>,
    pub stopped_at: Option<String>,
    pub submitted: bool,
}

/// Input for the kind-dispatching [`TaskRunner::run`](super::TaskRunner::run).
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerInput {
    Search(SearchRequest),
    Kit(KitRequest),
    Fill(FillRequest),
}

impl RunnerInput {
    pub fn kind(&self) -> TaskKind {
        match self {
            RunnerInput::Search(_) => TaskKind::JobSearch,
            RunnerInput::Kit(_) => TaskKind::KitGeneration,
            RunnerInput::Fill(_) => TaskKind::FormFill,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunnerOutput {
    Listings(Vec<JobListing>),
    Kit(KitContent),
    Filled(FillOutcome),
}

/// Errors a runner call can end with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// The remote service failed or answered with something unusable.
    #[error("{0}")]
    Remote(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("runner not configured: {0}")]
    NotConfigured(String),
}
