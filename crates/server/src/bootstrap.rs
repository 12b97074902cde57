// crates/server/src/bootstrap.rs
//! Builds the stores, runner and task manager from an [`AppConfig`] and
//! starts the background workers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use applykit_core::{
    create_runner, spawn_reaper, spawn_worker_pool, TaskManager, TaskQueue, Workflows,
};
use applykit_db::{
    default_blob_dir, default_db_path, LocalObjectStore, ObjectStore, RecordStore, Records,
    SqliteRecordStore, UrlSigner,
};
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::state::AppState;

/// Running service handles.
pub struct Services {
    pub state: Arc<AppState>,
    pub workers: JoinHandle<()>,
    pub reaper: Option<JoinHandle<()>>,
}

impl Services {
    /// Stop the background tasks. In-flight runs are dropped; the reaper
    /// fails them on a later start.
    pub fn shutdown(self) {
        self.workers.abort();
        if let Some(reaper) = self.reaper {
            reaper.abort();
        }
    }
}

pub async fn start_services(config: &AppConfig) -> anyhow::Result<Services> {
    let store: Arc<dyn RecordStore> = if config.uses_in_memory_database() {
        tracing::warn!("using an in-memory record store; records are lost on exit");
        Arc::new(SqliteRecordStore::new_in_memory().await?)
    } else {
        let path = match &config.storage.database_path {
            Some(path) => path.clone(),
            None => default_db_path()?,
        };
        Arc::new(
            SqliteRecordStore::new(&path)
                .await
                .with_context(|| format!("failed to open record store at {}", path.display()))?,
        )
    };

    let secret = match &config.storage.signing_secret {
        Some(secret) if !secret.is_empty() => secret.clone(),
        _ => {
            tracing::warn!("no signing secret configured; blob links will not survive a restart");
            uuid::Uuid::new_v4().to_string()
        }
    };
    let blob_dir = match &config.storage.blob_dir {
        Some(dir) => dir.clone(),
        None => default_blob_dir()?,
    };
    let blobs: Arc<dyn ObjectStore> = Arc::new(
        LocalObjectStore::new(&blob_dir, UrlSigner::new(secret, config.public_base_url()))
            .with_context(|| format!("failed to open blob directory {}", blob_dir.display()))?,
    );

    let runner = create_runner(&config.runner)?;
    tracing::info!(
        runner = runner.name(),
        record_store = store.name(),
        object_store = blobs.name(),
        "task services configured"
    );

    let workflows = Workflows::new(Records::new(store), blobs, runner, config.runner.clone());
    let (queue, rx) = TaskQueue::bounded(config.tasks.queue_capacity);
    let manager = Arc::new(TaskManager::new(workflows, queue));

    let workers = spawn_worker_pool(Arc::clone(&manager), rx, config.tasks.worker_concurrency);
    let reaper = spawn_reaper(
        Arc::clone(&manager),
        Duration::from_secs(config.tasks.reaper_interval_secs),
        Duration::from_secs(config.tasks.stale_after_secs),
    );

    let state = AppState::new(
        manager,
        config.server.default_owner.clone(),
        config.storage.presign_ttl_secs,
    );
    Ok(Services {
        state,
        workers,
        reaper,
    })
}
