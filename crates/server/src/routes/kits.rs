//! Application kit generation and lookup.

use std::sync::Arc;

use applykit_core::{DispatchMode, NO_RESUME_MESSAGE};
use applykit_types::{ApplicationKit, TaskKind, TaskStatus};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{body_owner, referenced_job, to_json};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /api/kits - generate a kit for a job, waiting for the result.
///
/// Body: `{"job_id", "resume_key"?, "user_id"?}`. Without `resume_key` the
/// owner's newest resume is used; 400 when there is none.
pub async fn generate_kit(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(mut body) = body?;
    let owner = body_owner(&state, &body);
    referenced_job(&state, &body).await?;

    let explicit = body
        .get("resume_key")
        .or_else(|| body.get("resume_s3_key"))
        .and_then(Value::as_str)
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string);
    let resume_key = state
        .tasks
        .workflows()
        .resolve_resume(&owner, explicit.as_deref())
        .await?
        .ok_or_else(|| ApiError::BadRequest(NO_RESUME_MESSAGE.into()))?;
    if let Value::Object(map) = &mut body {
        map.remove("resume_s3_key");
        map.insert("resume_key".into(), json!(resume_key));
    }

    let task = state
        .tasks
        .submit(TaskKind::KitGeneration, &owner, body, DispatchMode::Synchronous)
        .await?;
    if task.status != TaskStatus::Completed {
        return Err(ApiError::TaskFailed {
            message: task
                .error_message
                .unwrap_or_else(|| format!("kit generation ended {}", task.status)),
            task_id: task.task_id,
        });
    }

    let kit: ApplicationKit = task
        .result
        .clone()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ApiError::Internal(format!("malformed kit result: {e}")))?
        .ok_or_else(|| ApiError::Internal("completed kit task has no result".into()))?;
    let mut response = kit_json(&state, &kit)?;
    response["task_id"] = json!(task.task_id);
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct KitQuery {
    pub job_id: Option<String>,
    pub kit_id: Option<String>,
}

/// GET /api/kits?kit_id=… or ?job_id=… - one kit, or every kit for a job.
pub async fn list_kits(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KitQuery>,
) -> ApiResult<Json<Value>> {
    let kits = match (query.kit_id, query.job_id) {
        (Some(kit_id), _) => match state.records().get_kit(&kit_id).await? {
            Some(kit) => vec![kit],
            None => return Err(ApiError::not_found("Kit", kit_id)),
        },
        (None, Some(job_id)) => state.records().kits_for_job(&job_id).await?,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Either job_id or kit_id is required".into(),
            ))
        }
    };
    let kits = kits
        .iter()
        .map(|kit| kit_json(&state, kit))
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(json!({ "count": kits.len(), "kits": kits })))
}

/// Kit record plus a presigned `cover_letter_url`.
fn kit_json(state: &AppState, kit: &ApplicationKit) -> ApiResult<Value> {
    let mut value = to_json(kit)?;
    if let Some(url) = kit.cover_letter_key.as_deref().and_then(|k| state.blob_url(k)) {
        value["cover_letter_url"] = json!(url);
    }
    Ok(value)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/kits", get(list_kits).post(generate_kit))
}
