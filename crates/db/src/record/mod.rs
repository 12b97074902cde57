//! Record store contract.
//!
//! Records are JSON objects keyed by a kind-specific primary key field
//! (`job_id`, `kit_id`, `task_id`). Secondary indexes match one top-level
//! string field and order results by `created_at`.

mod memory;
mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::{DbError, DbResult};

/// The three record kinds the store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Job,
    Kit,
    Task,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Job => "job",
            RecordKind::Kit => "kit",
            RecordKind::Task => "task",
        }
    }

    /// Field holding the primary key.
    pub fn primary_key(&self) -> &'static str {
        match self {
            RecordKind::Job => "job_id",
            RecordKind::Kit => "kit_id",
            RecordKind::Task => "task_id",
        }
    }

    /// Extract the primary key of `record`.
    pub fn key_of(&self, record: &Value) -> DbResult<String> {
        record
            .get(self.primary_key())
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .ok_or(DbError::MissingKey {
                kind: *self,
                field: self.primary_key(),
            })
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secondary indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    /// `user_id`
    Owner,
    /// `job_id` (kits and tasks by parent job)
    Job,
    /// `status`
    Status,
}

impl Index {
    pub fn field(&self) -> &'static str {
        match self {
            Index::Owner => "user_id",
            Index::Job => "job_id",
            Index::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// A secondary-index lookup, ordered by `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQuery {
    pub index: Index,
    pub key: String,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl IndexQuery {
    /// Newest first, unlimited.
    pub fn new(index: Index, key: impl Into<String>) -> Self {
        Self {
            index,
            key: key.into(),
            order: SortOrder::Descending,
            limit: None,
        }
    }

    pub fn ascending(mut self) -> Self {
        self.order = SortOrder::Ascending;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn matches(&self, record: &Value) -> bool {
        record.get(self.index.field()).and_then(Value::as_str) == Some(self.key.as_str())
    }

    /// Sort and truncate `records` the way the query asks. Ties on
    /// `created_at` are broken by primary key so results are deterministic.
    pub(crate) fn arrange(&self, kind: RecordKind, records: &mut Vec<Value>) {
        let pk = kind.primary_key();
        records.sort_by(|a, b| {
            let by_time = created_at(a).cmp(&created_at(b));
            let ord = if by_time == Ordering::Equal {
                a.get(pk)
                    .and_then(Value::as_str)
                    .cmp(&b.get(pk).and_then(Value::as_str))
            } else {
                by_time
            };
            match self.order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
    }
}

pub(crate) fn created_at(record: &Value) -> i64 {
    record.get("created_at").and_then(Value::as_i64).unwrap_or(0)
}

/// One change in a partial update.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Set(String, Value),
    Remove(String),
}

impl FieldUpdate {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldUpdate::Set(field.into(), value.into())
    }

    pub fn remove(field: impl Into<String>) -> Self {
        FieldUpdate::Remove(field.into())
    }
}

/// Apply `updates` in order to a JSON object record.
pub(crate) fn apply_updates(record: &mut Value, updates: &[FieldUpdate]) {
    let Some(obj) = record.as_object_mut() else {
        return;
    };
    for update in updates {
        match update {
            FieldUpdate::Set(field, value) => {
                obj.insert(field.clone(), value.clone());
            }
            FieldUpdate::Remove(field) => {
                obj.remove(field);
            }
        }
    }
}

/// Guard on a partial update: the write only happens if the record's current
/// `field` equals `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub value: Value,
}

impl Condition {
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `Err` carries a description of the mismatch.
    pub(crate) fn check(&self, record: &Value) -> Result<(), String> {
        let current = record.get(&self.field).unwrap_or(&Value::Null);
        if *current == self.value {
            Ok(())
        } else {
            Err(format!(
                "expected {} = {}, found {}",
                self.field, self.value, current
            ))
        }
    }
}

/// Key-value storage for jobs, kits and tasks.
///
/// No operation spans more than one record; callers must tolerate one write
/// of a multi-record change landing without the other.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a record by its primary key.
    async fn put(&self, kind: RecordKind, record: Value) -> DbResult<()>;

    async fn get(&self, kind: RecordKind, key: &str) -> DbResult<Option<Value>>;

    async fn query(&self, kind: RecordKind, query: &IndexQuery) -> DbResult<Vec<Value>>;

    /// Partially update a record and return it as written.
    ///
    /// Fails with [`DbError::NotFound`] if the record does not exist and with
    /// [`DbError::ConditionFailed`] if `condition` does not hold.
    async fn update_fields(
        &self,
        kind: RecordKind,
        key: &str,
        updates: &[FieldUpdate],
        condition: Option<&Condition>,
    ) -> DbResult<Value>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_of_requires_non_empty_string() {
        assert_eq!(
            RecordKind::Task.key_of(&json!({"task_id": "t1"})).unwrap(),
            "t1"
        );
        assert!(RecordKind::Task.key_of(&json!({"task_id": ""})).is_err());
        assert!(RecordKind::Job.key_of(&json!({"task_id": "t1"})).is_err());
        assert!(RecordKind::Kit.key_of(&json!({"kit_id": 7})).is_err());
    }

    #[test]
    fn test_apply_updates_sets_and_removes() {
        let mut record = json!({"task_id": "t1", "status": "pending", "error_message": "x"});
        apply_updates(
            &mut record,
            &[
                FieldUpdate::set("status", "failed"),
                FieldUpdate::remove("error_message"),
                FieldUpdate::set("completed_at", 42),
            ],
        );
        assert_eq!(
            record,
            json!({"task_id": "t1", "status": "failed", "completed_at": 42})
        );
    }

    #[test]
    fn test_condition_reports_mismatch() {
        let cond = Condition::field_equals("status", "pending");
        assert!(cond.check(&json!({"status": "pending"})).is_ok());
        let err = cond.check(&json!({"status": "completed"})).unwrap_err();
        assert!(err.contains("completed"));
        assert!(cond.check(&json!({})).is_err());
    }

    #[test]
    fn test_arrange_orders_by_created_at_then_key() {
        let q = IndexQuery::new(Index::Owner, "u1");
        let mut records = vec![
            json!({"job_id": "a", "created_at": 1}),
            json!({"job_id": "c", "created_at": 2}),
            json!({"job_id": "b", "created_at": 2}),
        ];
        q.arrange(RecordKind::Job, &mut records);
        let ids: Vec<_> = records.iter().map(|r| r["job_id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let q = IndexQuery::new(Index::Owner, "u1").ascending().limit(2);
        q.arrange(RecordKind::Job, &mut records);
        let ids: Vec<_> = records.iter().map(|r| r["job_id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
