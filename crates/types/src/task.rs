//! Long-running units of work and their state machine.
//!
//! ```text
//! pending ──▶ processing ──▶ completed
//!    │            │
//!    │            └────────▶ failed
//!    ├──────────────────────▶ completed   (synchronous dispatch)
//!    └──────────────────────▶ failed
//! ```
//!
//! `completed` and `failed` are terminal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ParseEnumError;

/// Which workflow a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    JobSearch,
    KitGeneration,
    FormFill,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::JobSearch => "job_search",
            TaskKind::KitGeneration => "kit_generation",
            TaskKind::FormFill => "form_fill",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job_search" => Ok(TaskKind::JobSearch),
            "kit_generation" => Ok(TaskKind::KitGeneration),
            "form_fill" => Ok(TaskKind::FormFill),
            other => Err(ParseEnumError::new("task kind", other)),
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    /// Older records spell this `in_progress`.
    #[serde(alias = "in_progress")]
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Processing,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether a task in this status may move to `target`.
    ///
    /// Same-state moves are not transitions and are rejected.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        match (self, target) {
            (TaskStatus::Pending, TaskStatus::Processing) => true,
            (TaskStatus::Pending, TaskStatus::Completed) => true,
            (TaskStatus::Pending, TaskStatus::Failed) => true,

            (TaskStatus::Processing, TaskStatus::Completed) => true,
            (TaskStatus::Processing, TaskStatus::Failed) => true,

            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" | "in_progress" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(ParseEnumError::new("task status", other)),
        }
    }
}

/// A unit of asynchronous or long-running work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub kind: TaskKind,
    pub user_id: String,
    /// Parent job for kit generation and form fill tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub status: TaskStatus,
    /// Kind-specific parameters. Opaque to the lifecycle manager once validated.
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Object store keys produced by the run (screenshots, artifacts).
    #[serde(default)]
    pub blob_keys: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl Task {
    /// A fresh `pending` task with a random v4 UUID identifier.
    pub fn new(kind: TaskKind, user_id: impl Into<String>, input: Value, now: i64) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            kind,
            user_id: user_id.into(),
            job_id: None,
            status: TaskStatus::Pending,
            input,
            result: None,
            error_message: None,
            blob_keys: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
