// crates/server/src/error.rs
use applykit_core::TaskError;
use applykit_db::DbError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A synchronously dispatched task ended `failed`.
    #[error("Task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            what,
            id: id.into(),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Validation(msg) => ApiError::BadRequest(msg),
            TaskError::NotFound(id) => ApiError::not_found("Task", id),
            e @ TaskError::InvalidTransition { .. } => ApiError::Conflict(e.to_string()),
            TaskError::Conflict(id) => {
                ApiError::Conflict(format!("task {id} was modified concurrently"))
            }
            TaskError::Dispatch(msg) => ApiError::Unavailable(msg),
            TaskError::Store(e) => ApiError::from(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            ApiError::NotFound { what, id } => {
                tracing::debug!(what, id = %id, "Not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details(format!("{what} not found"), id),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, ErrorResponse::new(msg))
            }
            ApiError::Forbidden(msg) => {
                tracing::warn!(message = %msg, "Forbidden");
                (StatusCode::FORBIDDEN, ErrorResponse::new(msg))
            }
            ApiError::Conflict(msg) => {
                tracing::warn!(message = %msg, "Conflict");
                (StatusCode::CONFLICT, ErrorResponse::new(msg))
            }
            ApiError::Unavailable(msg) => {
                tracing::error!(message = %msg, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::with_details("Task could not be dispatched", msg),
                )
            }
            ApiError::TaskFailed { task_id, message } => {
                tracing::warn!(task_id = %task_id, message = %message, "Task failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details(message, format!("Task ID: {task_id}")),
                )
            }
            ApiError::Database(DbError::BlobNotFound(key)) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::with_details("Blob not found", key),
            ),
            ApiError::Database(DbError::InvalidBlobKey(key)) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::with_details("Invalid blob key", key),
            ),
            ApiError::Database(db_err) => {
                tracing::error!(error = %db_err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Database error"),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use applykit_types::TaskStatus;

    async fn render(err: ApiError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_task_errors_map_to_status_codes() {
        let (status, body) = render(TaskError::NotFound("t1".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Task not found");
        assert_eq!(body.details.as_deref(), Some("t1"));

        let (status, body) = render(TaskError::Validation("query is required".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "query is required");

        let (status, _) = render(
            TaskError::InvalidTransition {
                task_id: "t1".into(),
                from: TaskStatus::Completed,
                to: TaskStatus::Failed,
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = render(TaskError::Conflict("t1".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = render(TaskError::Dispatch("task queue is full".into()).into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.details.as_deref(), Some("task queue is full"));
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let (status, body) = render(ApiError::Database(DbError::NoDataDir)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Database error");
        assert!(body.details.is_none());

        let (status, body) = render(ApiError::Internal("secret path".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.details.is_none());
    }

    #[tokio::test]
    async fn test_blob_errors_are_client_errors() {
        let (status, _) = render(ApiError::Database(DbError::BlobNotFound("k".into()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = render(ApiError::Database(DbError::InvalidBlobKey("../x".into()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
