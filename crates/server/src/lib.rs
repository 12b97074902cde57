// crates/server/src/lib.rs
//! applykit server library.
//!
//! The Axum HTTP surface over the task lifecycle: job search, application
//! kit generation, form fill, task polling, and resume and blob storage.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod routes;
pub mod state;

pub use bootstrap::{start_services, Services};
pub use config::{AppConfig, Cli, Command, ServeArgs};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use metrics::{init_metrics, render_metrics};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes and `/metrics`
/// - CORS (allows any origin)
/// - Request tracing and request metrics
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(middleware::from_fn(metrics::track_requests))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
