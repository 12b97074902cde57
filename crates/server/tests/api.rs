//! HTTP-level tests through the full middleware stack.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use applykit_core::runner::MockTaskRunner;
use applykit_core::{RunnerConfig, TaskManager, TaskQueue, Workflows};
use applykit_db::{MemoryObjectStore, MemoryRecordStore, Records, UrlSigner};
use applykit_server::{create_app, start_services, AppConfig, AppState};
use applykit_types::TaskStatus;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

async fn app() -> (Router, Arc<AppState>, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.storage.database_path = Some(PathBuf::from(":memory:"));
    config.storage.blob_dir = Some(dir.path().to_path_buf());
    config.storage.signing_secret = Some("api-test".into());
    let services = start_services(&config).await.unwrap();
    let state = services.state.clone();
    (create_app(services.state), state, dir)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn wait_for_task(app: &Router, task_id: &str) -> Value {
    for _ in 0..300 {
        let (status, task) = call(app, "GET", &format!("/api/tasks/{task_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        if task["status"] == "completed" || task["status"] == "failed" {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {task_id} did not finish");
}

#[tokio::test]
async fn search_then_kit_then_fill() {
    let (app, _state, _dir) = app().await;

    let (status, queued) = call(
        &app,
        "POST",
        "/api/search",
        Some(json!({"query": "engineer", "user_id": "u1"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let search = wait_for_task(&app, queued["task_id"].as_str().unwrap()).await;
    assert_eq!(search["status"], "completed");
    assert_eq!(search["result"]["count"], 3);
    assert!(search.get("error_message").is_none());
    let job_id = search["result"]["jobs"][0]["job_id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        "POST",
        "/api/resumes",
        Some(json!({"file_content": STANDARD.encode("Ten years of Rust"), "content_type": "text/plain", "user_id": "u1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, kit) = call(
        &app,
        "POST",
        "/api/kits",
        Some(json!({"job_id": job_id, "user_id": "u1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{kit}");
    assert!(kit["cover_letter"].as_str().unwrap().len() > 20);

    let (status, queued) = call(
        &app,
        "POST",
        "/api/fill-form",
        Some(json!({
            "job_id": job_id,
            "user_id": "u1",
            "application_url": "https://jobs.example.com/apply",
            "form_data": {"name": "Ada Lovelace"},
            "submit": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let fill = wait_for_task(&app, queued["task_id"].as_str().unwrap()).await;
    assert_eq!(fill["status"], "completed");
    assert_eq!(fill["result"]["submitted"], true);

    let (_, job) = call(&app, "GET", &format!("/api/jobs/{job_id}"), None).await;
    assert_eq!(job["status"], "form_filled");

    let (_, tasks) = call(&app, "GET", &format!("/api/jobs/{job_id}/tasks"), None).await;
    assert_eq!(tasks["count"], 2);
}

#[tokio::test]
async fn unknown_task_is_structured_404() {
    let (app, _state, _dir) = app().await;
    let (status, body) = call(&app, "GET", "/api/tasks/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Task not found", "details": "nonexistent"}));
}

#[tokio::test]
async fn refused_dispatch_fails_task_and_returns_503() {
    let records = Records::new(Arc::new(MemoryRecordStore::new()));
    let workflows = Workflows::new(
        records.clone(),
        Arc::new(MemoryObjectStore::new(UrlSigner::new("s", "http://localhost"))),
        Arc::new(MockTaskRunner::new()),
        RunnerConfig::default(),
    );
    let (queue, rx) = TaskQueue::bounded(1);
    drop(rx);
    let state = AppState::new(Arc::new(TaskManager::new(workflows, queue)), "demo_user", 60);
    let app = create_app(state);

    let (status, body) = call(&app, "POST", "/api/search", Some(json!({"query": "rust"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["details"], "task queue is closed");

    let failed = records.tasks_with_status(TaskStatus::Failed).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(
        failed[0].error_message.as_deref(),
        Some("dispatch failed: task queue is closed")
    );
    assert!(records
        .tasks_with_status(TaskStatus::Pending)
        .await
        .unwrap()
        .is_empty());
}
