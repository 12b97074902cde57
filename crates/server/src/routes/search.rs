//! Job search submission.

use std::sync::Arc;

use applykit_types::TaskKind;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::Value;

use super::{accepted, submit_deferred};
use crate::error::ApiResult;
use crate::state::AppState;

/// POST /api/search - queue a `job_search` task.
///
/// Body: `{"query": "...", "location": "...", "max_results": 20, "user_id": "..."}`.
/// Poll `/api/tasks/{task_id}` for the found jobs.
pub async fn start_search(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(body) = body?;
    let task = submit_deferred(&state, TaskKind::JobSearch, body).await?;
    tracing::info!(task_id = %task.task_id, owner = %task.user_id, "job search queued");
    Ok(accepted(&task, "Job search started. Poll the task for results."))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/search", post(start_search))
}
