//! Prometheus metrics for the HTTP server.
//!
//! Installs the global recorder that collects both the request metrics
//! recorded here and the task metrics recorded by `applykit-core`.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const REQUESTS_TOTAL: &str = "applykit_http_requests_total";
const REQUEST_SECONDS: &str = "applykit_http_request_duration_seconds";

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Returns `true` if this call installed it, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();
    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total number of API requests");
    describe_histogram!(REQUEST_SECONDS, "Duration of API requests in seconds");
    applykit_core::metrics::describe_task_metrics();
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

/// Record a completed API request.
pub fn record_request(endpoint: &str, method: &str, status: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "endpoint" => endpoint.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(REQUEST_SECONDS, "endpoint" => endpoint.to_string())
        .record(duration.as_secs_f64());
}

/// Middleware recording [`record_request`] for every routed request.
/// Unmatched paths are grouped under `unmatched`.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();
    let start = Instant::now();

    let response = next.run(request).await;
    record_request(&endpoint, &method, response.status().as_u16(), start.elapsed());
    response
}
