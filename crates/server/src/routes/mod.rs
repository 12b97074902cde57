//! API route handlers for the applykit server.

pub mod blobs;
pub mod forms;
pub mod health;
pub mod jobs;
pub mod kits;
pub mod metrics;
pub mod resumes;
pub mod search;
pub mod tasks;

use std::sync::Arc;

use applykit_core::{DispatchMode, TaskError, TransitionPayload};
use applykit_db::normalize_numbers;
use applykit_types::{Job, Task, TaskKind, TaskStatus};
use axum::{http::StatusCode, Json, Router};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Create the combined router: API routes under `/api`, `/metrics` at the
/// root.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/search - Start a job search task (202)
/// - POST /api/kits - Generate an application kit (200, synchronous)
/// - GET  /api/kits?job_id=|kit_id= - Kits for a job, or one kit
/// - POST /api/fill-form - Start a form fill task (202)
/// - GET  /api/tasks/{task_id} - Poll a task
/// - GET  /api/jobs - Owner's jobs, newest first
/// - GET  /api/jobs/{job_id} - One job
/// - GET  /api/jobs/{job_id}/tasks - Tasks for a job
/// - POST /api/resumes - Upload a resume
/// - GET  /api/blobs/{*key} - Fetch a blob through a presigned link
/// - GET  /metrics - Prometheus exposition
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", search::router())
        .nest("/api", kits::router())
        .nest("/api", forms::router())
        .nest("/api", tasks::router())
        .nest("/api", jobs::router())
        .nest("/api", resumes::router())
        .nest("/api", blobs::router())
        .merge(metrics::router())
        .with_state(state)
}

/// `user_id` from a request body.
fn body_owner(state: &AppState, body: &Value) -> String {
    state.owner(body.get("user_id").and_then(Value::as_str))
}

/// The job named by `body.job_id`, 404 when it does not exist. A missing
/// `job_id` is left for task validation to report.
async fn referenced_job(state: &AppState, body: &Value) -> ApiResult<Option<Job>> {
    let Some(job_id) = body.get("job_id").and_then(Value::as_str) else {
        return Ok(None);
    };
    if job_id.trim().is_empty() {
        return Ok(None);
    }
    match state.records().get_job(job_id).await? {
        Some(job) => Ok(Some(job)),
        None => Err(ApiError::not_found("Job", job_id)),
    }
}

/// Create a `kind` task and hand it to the worker queue.
///
/// A task the queue refuses is failed on the spot so it never lingers in
/// `pending`.
async fn submit_deferred(state: &AppState, kind: TaskKind, body: Value) -> ApiResult<Task> {
    let owner = body_owner(state, &body);
    let task = state.tasks.create(kind, &owner, body).await?;
    match state.tasks.dispatch(&task, DispatchMode::Deferred).await {
        Ok(task) => Ok(task),
        Err(TaskError::Dispatch(msg)) => {
            if let Err(e) = state
                .tasks
                .transition(
                    &task.task_id,
                    TaskStatus::Failed,
                    TransitionPayload::failed(format!("dispatch failed: {msg}")),
                )
                .await
            {
                tracing::error!(task_id = %task.task_id, error = %e, "could not fail undispatched task");
            }
            Err(ApiError::Unavailable(msg))
        }
        Err(e) => Err(e.into()),
    }
}

/// 202 body for a queued task.
fn accepted(task: &Task, message: &str) -> (StatusCode, Json<Value>) {
    let mut body = json!({
        "task_id": task.task_id,
        "kind": task.kind,
        "status": task.status,
        "message": message,
    });
    if let Some(job_id) = &task.job_id {
        body["job_id"] = json!(job_id);
    }
    (StatusCode::ACCEPTED, Json(body))
}

/// Serialize a record for a response, with whole-number floats as integers.
fn to_json<T: serde::Serialize>(record: &T) -> ApiResult<Value> {
    let value = serde_json::to_value(record)
        .map_err(|e| ApiError::Internal(format!("failed to serialize response: {e}")))?;
    Ok(normalize_numbers(value))
}
