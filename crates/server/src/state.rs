// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use applykit_core::TaskManager;
use applykit_db::{ObjectStore, Records};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Task lifecycle manager; also owns the record and object stores.
    pub tasks: Arc<TaskManager>,
    /// Owner for requests without a `user_id`.
    pub default_owner: String,
    /// Lifetime of presigned blob links handed out in responses.
    pub presign_ttl_secs: u64,
}

impl AppState {
    pub fn new(tasks: Arc<TaskManager>, default_owner: impl Into<String>, presign_ttl_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            tasks,
            default_owner: default_owner.into(),
            presign_ttl_secs,
        })
    }

    /// Get server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn records(&self) -> &Records {
        self.tasks.records()
    }

    pub fn blobs(&self) -> &Arc<dyn ObjectStore> {
        self.tasks.workflows().blobs()
    }

    /// `requested` when it is non-blank, else the default owner.
    pub fn owner(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            Some(owner) if !owner.is_empty() => owner.to_string(),
            _ => self.default_owner.clone(),
        }
    }

    /// Presigned link for `key`, or `None` (logged) if the key is unusable.
    pub fn blob_url(&self, key: &str) -> Option<String> {
        match self.blobs().presigned_url(key, self.presign_ttl_secs) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(key, error = %e, "cannot presign blob key");
                None
            }
        }
    }
}
