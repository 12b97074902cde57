//! Domain records shared by every applykit crate.
//!
//! Three record kinds live in the record store: [`Job`], [`ApplicationKit`]
//! and [`Task`]. Status and kind fields are closed enums so a typo in a
//! stored record fails at deserialization instead of comparing unequal later.

pub mod job;
pub mod kit;
pub mod task;

pub use job::{Job, JobStatus};
pub use kit::ApplicationKit;
pub use task::{Task, TaskKind, TaskStatus};

use thiserror::Error;

/// Owner used when a request does not name one.
pub const DEFAULT_OWNER: &str = "demo_user";

/// Metadata attached to jobs and kits.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Current time as Unix epoch seconds, the timestamp unit of every record.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A status or kind string that is not one of the known variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {field} value: {value:?}")]
pub struct ParseEnumError {
    pub field: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}
