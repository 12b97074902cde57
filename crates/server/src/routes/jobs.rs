//! Job listing endpoints.

use std::sync::Arc;

use applykit_types::JobStatus;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::to_json;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub limit: Option<usize>,
    pub status: Option<String>,
    pub user_id: Option<String>,
}

/// GET /api/jobs - the owner's jobs, newest first.
///
/// `status` filters the page after `limit` is applied.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobsQuery>,
) -> ApiResult<Json<Value>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let owner = state.owner(query.user_id.as_deref());

    let jobs = state.records().list_jobs(&owner, limit).await?;
    let jobs = jobs
        .iter()
        .filter(|job| status.map_or(true, |s| job.status == s))
        .map(to_json)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(json!({ "count": jobs.len(), "jobs": jobs })))
}

/// GET /api/jobs/{job_id}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let job = state
        .records()
        .get_job(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job", &job_id))?;
    Ok(Json(to_json(&job)?))
}

/// GET /api/jobs/{job_id}/tasks - tasks that reference the job.
pub async fn job_tasks(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if state.records().get_job(&job_id).await?.is_none() {
        return Err(ApiError::not_found("Job", job_id));
    }
    let tasks = state.records().tasks_for_job(&job_id).await?;
    let tasks = tasks.iter().map(to_json).collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(json!({ "count": tasks.len(), "tasks": tasks })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{job_id}", get(get_job))
        .route("/jobs/{job_id}/tasks", get(job_tasks))
}
