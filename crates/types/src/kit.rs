//! Generated application materials.

use serde::{Deserialize, Serialize};

use crate::Metadata;

/// Cover letter and resume bullets tailored to one job. Never mutated after
/// it is written; regenerating creates a new kit for the same job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationKit {
    pub kit_id: String,
    pub job_id: String,
    pub user_id: String,
    pub cover_letter: String,
    pub resume_bullets: Vec<String>,
    /// Object store key of the cover letter text, when it was uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter_key: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub metadata: Metadata,
}
