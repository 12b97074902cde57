//! Presigned blob retrieval.

use std::sync::Arc;

use applykit_db::SignatureError;
use applykit_types::unix_now;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

/// GET /api/blobs/{*key}?expires=…&signature=… - serve a blob when the link
/// signature checks out and has not expired.
pub async fn get_blob(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> ApiResult<Response> {
    let (Some(expires), Some(signature)) = (query.expires, query.signature) else {
        return Err(ApiError::Forbidden("missing link signature".into()));
    };
    state
        .blobs()
        .signer()
        .verify(&key, expires, &signature, unix_now())
        .map_err(|e| match e {
            SignatureError::Expired => ApiError::Forbidden("link expired".into()),
            SignatureError::Invalid => ApiError::Forbidden("invalid link signature".into()),
        })?;

    let blob = state.blobs().get_blob(&key).await?;
    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes).into_response())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/blobs/{*key}", get(get_blob))
}

#[cfg(test)]
mod tests {
    use super::super::testing::test_state;
    use crate::routes::api_routes;
    use applykit_db::BlobMetadata;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn fetch(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>, Option<String>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec(), content_type)
    }

    /// Path and query of a presigned URL.
    fn local_part(url: &str) -> &str {
        let start = url.find("/api/blobs/").unwrap();
        &url[start..]
    }

    #[tokio::test]
    async fn test_signed_link_serves_blob() {
        let (state, _dir) = test_state().await;
        state
            .blobs()
            .put_blob(
                "cover-letters/u1/j1_5.txt",
                b"Dear team".to_vec(),
                "text/plain; charset=utf-8",
                BlobMetadata::new(),
            )
            .await
            .unwrap();
        let url = state.blob_url("cover-letters/u1/j1_5.txt").unwrap();

        let (status, body, content_type) = fetch(api_routes(state), local_part(&url)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Dear team");
        assert_eq!(content_type.as_deref(), Some("text/plain; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_bad_or_missing_signature_forbidden() {
        let (state, _dir) = test_state().await;
        let url = state.blob_url("resumes/u1/resume_1.pdf").unwrap();
        let tampered = local_part(&url).replace("resume_1.pdf", "resume_2.pdf");
        let app = api_routes(state);

        let (status, _, _) = fetch(app.clone(), &tampered).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _, _) = fetch(app, "/api/blobs/resumes/u1/resume_1.pdf").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_signed_link_to_missing_blob_is_404() {
        let (state, _dir) = test_state().await;
        let url = state.blob_url("resumes/u1/resume_9.pdf").unwrap();
        let (status, _, _) = fetch(api_routes(state), local_part(&url)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
