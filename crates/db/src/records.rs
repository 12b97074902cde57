use std::sync::Arc;

use applykit_types::{ApplicationKit, Job, JobStatus, Task, TaskStatus};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::record::{Condition, FieldUpdate, Index, IndexQuery, RecordKind, RecordStore};
use crate::DbResult;

/// Typed access to jobs, kits and tasks over any [`RecordStore`].
#[derive(Clone)]
pub struct Records {
    store: Arc<dyn RecordStore>,
}

impl Records {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    async fn put<T: Serialize>(&self, kind: RecordKind, record: &T) -> DbResult<()> {
        self.store.put(kind, serde_json::to_value(record)?).await
    }

    async fn get<T: DeserializeOwned>(&self, kind: RecordKind, key: &str) -> DbResult<Option<T>> {
        self.store
            .get(kind, key)
            .await?
            .map(decode)
            .transpose()
    }

    async fn query<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
        query: IndexQuery,
    ) -> DbResult<Vec<T>> {
        self.store
            .query(kind, &query)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    // ── Jobs ──────────────────────────────────────────────────────────

    /// Insert or replace a job. Search re-runs upsert the same posting.
    pub async fn put_job(&self, job: &Job) -> DbResult<()> {
        self.put(RecordKind::Job, job).await
    }

    pub async fn get_job(&self, job_id: &str) -> DbResult<Option<Job>> {
        self.get(RecordKind::Job, job_id).await
    }

    /// Newest first.
    pub async fn list_jobs(&self, owner: &str, limit: usize) -> DbResult<Vec<Job>> {
        self.query(RecordKind::Job, IndexQuery::new(Index::Owner, owner).limit(limit))
            .await
    }

    pub async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        now: i64,
    ) -> DbResult<Job> {
        let updated = self
            .store
            .update_fields(
                RecordKind::Job,
                job_id,
                &[
                    FieldUpdate::set("status", status.as_str()),
                    FieldUpdate::set("updated_at", now),
                ],
                None,
            )
            .await?;
        decode(updated)
    }

    // ── Kits ──────────────────────────────────────────────────────────

    pub async fn put_kit(&self, kit: &ApplicationKit) -> DbResult<()> {
        self.put(RecordKind::Kit, kit).await
    }

    pub async fn get_kit(&self, kit_id: &str) -> DbResult<Option<ApplicationKit>> {
        self.get(RecordKind::Kit, kit_id).await
    }

    /// Newest first.
    pub async fn kits_for_job(&self, job_id: &str) -> DbResult<Vec<ApplicationKit>> {
        self.query(RecordKind::Kit, IndexQuery::new(Index::Job, job_id))
            .await
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    pub async fn put_task(&self, task: &Task) -> DbResult<()> {
        self.put(RecordKind::Task, task).await
    }

    pub async fn get_task(&self, task_id: &str) -> DbResult<Option<Task>> {
        self.get(RecordKind::Task, task_id).await
    }

    /// Partial task update, applied only while the task is still in
    /// `expected` status.
    pub async fn update_task(
        &self,
        task_id: &str,
        expected: TaskStatus,
        updates: &[FieldUpdate],
    ) -> DbResult<Task> {
        let condition = Condition::field_equals("status", expected.as_str());
        let updated = self
            .store
            .update_fields(RecordKind::Task, task_id, updates, Some(&condition))
            .await?;
        decode(updated)
    }

    /// Newest first.
    pub async fn tasks_for_job(&self, job_id: &str) -> DbResult<Vec<Task>> {
        self.query(RecordKind::Task, IndexQuery::new(Index::Job, job_id))
            .await
    }

    /// Oldest first.
    pub async fn tasks_with_status(&self, status: TaskStatus) -> DbResult<Vec<Task>> {
        self.query(
            RecordKind::Task,
            IndexQuery::new(Index::Status, status.as_str()).ascending(),
        )
        .await
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> DbResult<T> {
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DbError, MemoryRecordStore, SqliteRecordStore};
    use applykit_types::TaskKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn job(id: &str, owner: &str, created_at: i64) -> Job {
        Job {
            job_id: id.to_string(),
            user_id: owner.to_string(),
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            location: None,
            description: String::new(),
            url: format!("https://jobs.example.com/{id}"),
            source: "research_api".to_string(),
            status: JobStatus::Found,
            created_at,
            updated_at: created_at,
            metadata: Default::default(),
        }
    }

    async fn backends() -> Vec<Records> {
        vec![
            Records::new(Arc::new(MemoryRecordStore::new())),
            Records::new(Arc::new(SqliteRecordStore::new_in_memory().await.unwrap())),
        ]
    }

    #[tokio::test]
    async fn test_jobs_listed_per_owner_newest_first() {
        for records in backends().await {
            records.put_job(&job("j1", "u1", 1)).await.unwrap();
            records.put_job(&job("j2", "u1", 2)).await.unwrap();
            records.put_job(&job("j3", "u2", 3)).await.unwrap();

            let jobs = records.list_jobs("u1", 50).await.unwrap();
            let ids: Vec<_> = jobs.iter().map(|j| j.job_id.as_str()).collect();
            assert_eq!(ids, vec!["j2", "j1"], "backend {}", records.store().name());
        }
    }

    #[tokio::test]
    async fn test_update_job_status_touches_updated_at() {
        for records in backends().await {
            records.put_job(&job("j1", "u1", 1)).await.unwrap();
            let updated = records
                .update_job_status("j1", JobStatus::KitGenerated, 50)
                .await
                .unwrap();
            assert_eq!(updated.status, JobStatus::KitGenerated);
            assert_eq!(updated.updated_at, 50);
            assert_eq!(updated.created_at, 1);

            let err = records
                .update_job_status("missing", JobStatus::FormFilled, 50)
                .await
                .unwrap_err();
            assert!(matches!(err, DbError::NotFound { .. }));
        }
    }

    #[tokio::test]
    async fn test_task_update_guarded_by_expected_status() {
        for records in backends().await {
            let task = Task::new(TaskKind::JobSearch, "u1", json!({"query": "rust"}), 10);
            records.put_task(&task).await.unwrap();

            let processing = records
                .update_task(
                    &task.task_id,
                    TaskStatus::Pending,
                    &[FieldUpdate::set("status", "processing")],
                )
                .await
                .unwrap();
            assert_eq!(processing.status, TaskStatus::Processing);

            let err = records
                .update_task(
                    &task.task_id,
                    TaskStatus::Pending,
                    &[FieldUpdate::set("status", "failed")],
                )
                .await
                .unwrap_err();
            assert!(matches!(err, DbError::ConditionFailed { .. }));

            let pending = records.tasks_with_status(TaskStatus::Pending).await.unwrap();
            assert!(pending.is_empty());
            let active = records
                .tasks_with_status(TaskStatus::Processing)
                .await
                .unwrap();
            assert_eq!(active.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_kits_and_tasks_indexed_by_job() {
        for records in backends().await {
            for (id, ts) in [("k1", 1), ("k2", 2)] {
                records
                    .put_kit(&ApplicationKit {
                        kit_id: id.to_string(),
                        job_id: "j1".to_string(),
                        user_id: "u1".to_string(),
                        cover_letter: "Dear team".to_string(),
                        resume_bullets: vec!["Shipped things".to_string()],
                        cover_letter_key: None,
                        created_at: ts,
                        metadata: Default::default(),
                    })
                    .await
                    .unwrap();
            }
            let task = Task::new(TaskKind::FormFill, "u1", json!({}), 5).with_job_id("j1");
            records.put_task(&task).await.unwrap();
            let orphan = Task::new(TaskKind::JobSearch, "u1", json!({}), 6);
            records.put_task(&orphan).await.unwrap();

            let kits = records.kits_for_job("j1").await.unwrap();
            assert_eq!(kits[0].kit_id, "k2");
            assert_eq!(kits.len(), 2);
            assert_eq!(records.get_kit("k1").await.unwrap().unwrap().created_at, 1);

            let tasks = records.tasks_for_job("j1").await.unwrap();
            assert_eq!(tasks.len(), 1);
            assert_eq!(tasks[0].task_id, task.task_id);
        }
    }
}
