// crates/core/src/error.rs
use applykit_db::DbError;
use applykit_types::TaskStatus;
use thiserror::Error;

use crate::runner::RunnerError;

/// Errors from the task lifecycle manager.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("task {0} was modified concurrently")]
    Conflict(String),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("store error: {0}")]
    Store(#[source] DbError),
}

impl TaskError {
    /// Map a store error for task `task_id`: a failed status guard is a
    /// concurrent writer, a vanished record is not-found.
    pub(crate) fn from_store(task_id: &str, err: DbError) -> Self {
        match err {
            DbError::ConditionFailed { .. } => TaskError::Conflict(task_id.to_string()),
            DbError::NotFound { .. } => TaskError::NotFound(task_id.to_string()),
            other => TaskError::Store(other),
        }
    }
}

/// Errors while running a task's workflow. The `Display` text becomes the
/// task's `error_message`.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("store error: {0}")]
    Store(#[from] DbError),
}
