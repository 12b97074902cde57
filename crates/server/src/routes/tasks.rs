//! Task polling.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::to_json;
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/tasks/{task_id} - current task record.
///
/// Adds `blob_urls`: presigned links for the task's `blob_keys`, in order.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let task = state.tasks.poll(&task_id).await?;
    let urls: Vec<String> = task
        .blob_keys
        .iter()
        .filter_map(|key| state.blob_url(key))
        .collect();
    let mut body = to_json(&task)?;
    body["blob_urls"] = json!(urls);
    Ok(Json(body))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/{task_id}", get(get_task))
}
