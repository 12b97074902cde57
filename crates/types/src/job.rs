//! Discovered job postings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Metadata, ParseEnumError};

/// Where a job is in the application pipeline.
///
/// The progression `found → kit_generated → form_filled → ready_to_submit`
/// is advisory; writers may skip steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Found,
    KitGenerated,
    FormFilled,
    ReadyToSubmit,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Found => "found",
            JobStatus::KitGenerated => "kit_generated",
            JobStatus::FormFilled => "form_filled",
            JobStatus::ReadyToSubmit => "ready_to_submit",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "found" => Ok(JobStatus::Found),
            "kit_generated" => Ok(JobStatus::KitGenerated),
            "form_filled" => Ok(JobStatus::FormFilled),
            "ready_to_submit" => Ok(JobStatus::ReadyToSubmit),
            other => Err(ParseEnumError::new("job status", other)),
        }
    }
}

/// A job posting found by a search task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub user_id: String,
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub description: String,
    pub url: String,
    /// Origin tag, e.g. `research_api`.
    pub source: String,
    pub status: JobStatus,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Job {
    /// Stable identifier for a posting: the first 16 hex chars of
    /// `sha256("{title}_{company}")`. Re-running a search upserts the same
    /// postings instead of duplicating them.
    pub fn derive_id(title: &str, company: &str) -> String {
        let digest = Sha256::digest(format!("{title}_{company}").as_bytes());
        let mut id = hex::encode(digest);
        id.truncate(16);
        id
    }
}
