//! Application form fill submission.

use std::sync::Arc;

use applykit_types::TaskKind;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::Value;

use super::{accepted, referenced_job, submit_deferred};
use crate::error::ApiResult;
use crate::state::AppState;

/// POST /api/fill-form - queue a `form_fill` task for an existing job.
///
/// Body: `{"job_id", "application_url", "form_data": {..}, "submit": false}`.
/// The browser stops before the submit button unless `submit` is true.
pub async fn start_fill(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(body) = body?;
    referenced_job(&state, &body).await?;
    let task = submit_deferred(&state, TaskKind::FormFill, body).await?;
    tracing::info!(task_id = %task.task_id, job_id = ?task.job_id, "form fill queued");
    Ok(accepted(
        &task,
        "Form fill started. Poll the task for screenshots and filled fields.",
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/fill-form", post(start_fill))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{get, post, test_state};
    use crate::routes::api_routes;
    use applykit_types::{Job, JobStatus};
    use axum::http::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    fn job(job_id: &str) -> Job {
        Job {
            job_id: job_id.into(),
            user_id: "demo_user".into(),
            title: "Platform Engineer".into(),
            company: "Ferrous".into(),
            location: None,
            description: "Run the platform".into(),
            url: "https://jobs.example.com/p".into(),
            source: "research_api".into(),
            status: JobStatus::Found,
            created_at: 1,
            updated_at: 1,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_fill_for_unknown_job_is_404() {
        let (state, _dir) = test_state().await;
        let (status, body) = post(
            api_routes(state),
            "/api/fill-form",
            json!({"job_id": "ghost", "application_url": "https://x.example.com"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Job not found");
    }

    #[tokio::test]
    async fn test_fill_requires_application_url() {
        let (state, _dir) = test_state().await;
        state.records().put_job(&job("j1")).await.unwrap();
        let (status, body) = post(api_routes(state), "/api/fill-form", json!({"job_id": "j1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "application_url is required");
    }

    #[tokio::test]
    async fn test_fill_runs_in_background_and_advances_job() {
        let (state, _dir) = test_state().await;
        state.records().put_job(&job("j1")).await.unwrap();
        let app = api_routes(state.clone());

        let (status, body) = post(
            app.clone(),
            "/api/fill-form",
            json!({
                "job_id": "j1",
                "application_url": "https://jobs.example.com/apply",
                "form_data": {"email": "ada@example.com"},
            }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["job_id"], "j1");
        let task_id = body["task_id"].as_str().unwrap().to_string();

        let mut task = json!(null);
        for _ in 0..200 {
            let (_, polled) = get(app.clone(), &format!("/api/tasks/{task_id}")).await;
            if polled["status"] == "completed" || polled["status"] == "failed" {
                task = polled;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(task["status"], "completed");
        assert_eq!(task["result"]["filled_fields"]["email"], "ada@example.com");
        assert_eq!(task["blob_urls"].as_array().unwrap().len(), 1);

        let job = state.records().get_job("j1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::ReadyToSubmit);
    }
}
