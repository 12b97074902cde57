// crates/core/src/worker.rs
//! Background execution of deferred tasks.
//!
//! Handlers push task ids into a bounded [`TaskQueue`]; a worker pool drains
//! it with at most `concurrency` tasks running at once. A reaper sweeps
//! tasks that stopped making progress.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::TaskError;
use crate::lifecycle::TaskManager;

/// Sending half of the deferred task queue.
///
/// Also tracks which task ids are waiting in the queue or held by a worker,
/// so the reaper can tell a queued task from an abandoned one.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<String>,
    waiting: Arc<Mutex<HashSet<String>>>,
}

impl TaskQueue {
    /// A queue holding at most `capacity` waiting task ids, and the receiver
    /// to hand to [`spawn_worker_pool`].
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            tx,
            waiting: Arc::new(Mutex::new(HashSet::new())),
        };
        (queue, rx)
    }

    /// Queue `task_id` without waiting. Fails when the queue is full or no
    /// worker pool is listening.
    pub fn enqueue(&self, task_id: &str) -> Result<(), TaskError> {
        self.waiting().insert(task_id.to_string());
        let refused = match self.tx.try_send(task_id.to_string()) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(task_id, "task queue full");
                TaskError::Dispatch("task queue is full".into())
            }
            Err(TrySendError::Closed(_)) => {
                error!(task_id, "task queue closed");
                TaskError::Dispatch("task queue is closed".into())
            }
        };
        self.release(task_id);
        Err(refused)
    }

    /// Whether `task_id` was queued and its run has not finished yet.
    pub fn is_waiting(&self, task_id: &str) -> bool {
        self.waiting().contains(task_id)
    }

    /// Forget `task_id` once its run is over.
    pub(crate) fn release(&self, task_id: &str) {
        self.waiting().remove(task_id);
    }

    fn waiting(&self) -> MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock cannot leave the set half-updated.
        self.waiting.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Spawn the pool that executes queued tasks. Exits when every
/// [`TaskQueue`] handle is gone.
pub fn spawn_worker_pool(
    manager: Arc<TaskManager>,
    mut queue: mpsc::Receiver<String>,
    concurrency: usize,
) -> JoinHandle<()> {
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    tokio::spawn(async move {
        info!(concurrency, "task worker pool started");
        loop {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(error = %e, "worker pool semaphore closed");
                    break;
                }
            };
            let Some(task_id) = queue.recv().await else {
                break;
            };

            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                match manager.execute(&task_id).await {
                    Ok(task) => debug!(task_id, status = %task.status, "task run finished"),
                    Err(e) => error!(task_id, error = %e, "task run failed"),
                }
                drop(permit);
            });
        }
        warn!("task worker pool exiting");
    })
}

/// Spawn the stale-task reaper, sweeping every `interval`. Returns `None`
/// when `max_age` is zero.
pub fn spawn_reaper(
    manager: Arc<TaskManager>,
    interval: Duration,
    max_age: Duration,
) -> Option<JoinHandle<()>> {
    if max_age.is_zero() {
        info!("stale task reaper disabled");
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = manager.reap_stale(max_age).await {
                error!(error = %e, "stale task sweep failed");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use applykit_types::{TaskKind, TaskStatus};
    use serde_json::json;

    use crate::workflows::testing::workflows;

    #[test]
    fn test_enqueue_full_and_closed() {
        let (queue, rx) = TaskQueue::bounded(1);
        queue.enqueue("t1").unwrap();
        let err = queue.enqueue("t2").unwrap_err();
        assert_eq!(err.to_string(), "dispatch failed: task queue is full");
        assert!(queue.is_waiting("t1"));
        assert!(!queue.is_waiting("t2"));

        drop(rx);
        let err = queue.enqueue("t3").unwrap_err();
        assert_eq!(err.to_string(), "dispatch failed: task queue is closed");
    }

    #[tokio::test]
    async fn test_pool_runs_every_queued_task() {
        let (queue, rx) = TaskQueue::bounded(8);
        let manager = Arc::new(TaskManager::new(workflows(), queue.clone()));
        let pool = spawn_worker_pool(Arc::clone(&manager), rx, 1);

        let mut ids = Vec::new();
        for query in ["rust", "go", "zig"] {
            let task = manager
                .create(TaskKind::JobSearch, "u1", json!({"query": query}))
                .await
                .unwrap();
            queue.enqueue(&task.task_id).unwrap();
            ids.push(task.task_id);
        }

        for task_id in &ids {
            let mut status = TaskStatus::Pending;
            for _ in 0..200 {
                status = manager.poll(task_id).await.unwrap().status;
                if status.is_terminal() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            assert_eq!(status, TaskStatus::Completed);
        }
        for _ in 0..200 {
            if ids.iter().all(|id| !queue.is_waiting(id)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(ids.iter().all(|id| !queue.is_waiting(id)));
        pool.abort();
    }

    #[tokio::test]
    async fn test_reaper_disabled_for_zero_age() {
        let (queue, _rx) = TaskQueue::bounded(1);
        let manager = Arc::new(TaskManager::new(workflows(), queue));
        assert!(spawn_reaper(manager, Duration::from_secs(1), Duration::ZERO).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_sweeps_on_interval() {
        let (queue, _rx) = TaskQueue::bounded(1);
        let manager = Arc::new(TaskManager::new(workflows(), queue));
        let old = applykit_types::Task::new(
            TaskKind::JobSearch,
            "u1",
            json!({"query": "x"}),
            applykit_types::unix_now() - 3_600,
        );
        manager.records().put_task(&old).await.unwrap();

        let handle = spawn_reaper(
            Arc::clone(&manager),
            Duration::from_secs(60),
            Duration::from_secs(600),
        )
        .unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let task = manager.poll(&old.task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        handle.abort();
    }
}
