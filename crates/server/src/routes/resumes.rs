//! Resume uploads.

use std::sync::Arc;

use applykit_db::{keys, BlobMetadata};
use applykit_types::unix_now;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::post,
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadResume {
    /// Base64 encoded file.
    #[serde(default)]
    pub file_content: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub user_id: Option<String>,
}

fn default_content_type() -> String {
    "application/pdf".to_string()
}

/// POST /api/resumes - store a resume; it becomes the owner's newest.
pub async fn upload_resume(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UploadResume>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(upload) = body?;
    if upload.file_content.trim().is_empty() {
        return Err(ApiError::BadRequest("file_content is required".into()));
    }
    let bytes = STANDARD
        .decode(upload.file_content.trim())
        .map_err(|e| ApiError::BadRequest(format!("file_content is not valid base64: {e}")))?;

    let owner = state.owner(upload.user_id.as_deref());
    let now = unix_now();
    let mut metadata = BlobMetadata::new();
    metadata.insert("user_id".into(), owner.clone());
    metadata.insert("uploaded_at".into(), now.to_string());
    let key = state
        .blobs()
        .put_blob(&keys::resume(&owner, now), bytes, &upload.content_type, metadata)
        .await?;
    tracing::info!(owner = %owner, key = %key, "resume uploaded");

    Ok(Json(json!({
        "resume_key": key,
        "url": state.blob_url(&key),
        "message": "Resume uploaded successfully",
    })))
}

#[derive(Debug, Deserialize)]
pub struct ResumeQuery {
    pub user_id: Option<String>,
}

/// GET /api/resumes - the owner's resume keys, oldest first.
pub async fn list_resumes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResumeQuery>,
) -> ApiResult<Json<Value>> {
    let owner = state.owner(query.user_id.as_deref());
    let mut found = state.blobs().list(&keys::resume_prefix(&owner)).await?;
    found.sort_by_key(|key| keys::timestamp(key));
    let resumes: Vec<Value> = found
        .iter()
        .map(|key| json!({ "resume_key": key, "url": state.blob_url(key) }))
        .collect();
    Ok(Json(json!({ "count": resumes.len(), "resumes": resumes })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/resumes", post(upload_resume).get(list_resumes))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{get, post, test_state};
    use super::*;
    use crate::routes::api_routes;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_upload_then_list() {
        let (state, _dir) = test_state().await;
        let app = api_routes(state.clone());

        let (status, body) = post(
            app.clone(),
            "/api/resumes",
            json!({"file_content": STANDARD.encode(b"%PDF-1.4 resume"), "user_id": "u1"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let key = body["resume_key"].as_str().unwrap().to_string();
        assert!(key.starts_with("resumes/u1/resume_"));
        assert!(body["url"].as_str().unwrap().contains("signature="));

        let blob = state.blobs().get_blob(&key).await.unwrap();
        assert_eq!(blob.bytes, b"%PDF-1.4 resume");
        assert_eq!(blob.content_type, "application/pdf");

        let (_, listed) = get(app, "/api/resumes?user_id=u1").await;
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["resumes"][0]["resume_key"], key.as_str());
    }

    #[tokio::test]
    async fn test_same_second_uploads_keep_both_resumes() {
        let (state, _dir) = test_state().await;
        let app = api_routes(state);

        let mut uploaded = Vec::new();
        for body in ["first", "second"] {
            let (status, resp) = post(
                app.clone(),
                "/api/resumes",
                json!({"file_content": STANDARD.encode(body), "user_id": "u1"}),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            uploaded.push(resp["resume_key"].as_str().unwrap().to_string());
        }
        assert_ne!(uploaded[0], uploaded[1]);

        let (_, listed) = get(app.clone(), "/api/resumes?user_id=u1").await;
        assert_eq!(listed["count"], 2);

        let (status, resp) = post(
            app.clone(),
            "/api/resumes",
            json!({"file_content": STANDARD.encode("nested"), "user_id": "u1/other"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(resp["resume_key"].as_str().unwrap().starts_with("resumes/u1%2Fother/"));
        let (_, listed) = get(app, "/api/resumes?user_id=u1").await;
        assert_eq!(listed["count"], 2);
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_content() {
        let (state, _dir) = test_state().await;
        let app = api_routes(state);
        let (status, body) = post(app.clone(), "/api/resumes", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "file_content is required");

        let (status, _) = post(app, "/api/resumes", json!({"file_content": "***"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
