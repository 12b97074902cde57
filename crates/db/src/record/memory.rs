use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{apply_updates, Condition, FieldUpdate, IndexQuery, RecordKind, RecordStore};
use crate::{DbError, DbResult};

type Table = HashMap<(RecordKind, String), Value>;

/// Process-local record store for tests and single-node demos.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<Table>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Table> {
        self.records.read().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned reading records: {e}");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table> {
        self.records.write().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned writing records: {e}");
            e.into_inner()
        })
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, kind: RecordKind, record: Value) -> DbResult<()> {
        let key = kind.key_of(&record)?;
        self.write().insert((kind, key), record);
        Ok(())
    }

    async fn get(&self, kind: RecordKind, key: &str) -> DbResult<Option<Value>> {
        Ok(self.read().get(&(kind, key.to_string())).cloned())
    }

    async fn query(&self, kind: RecordKind, query: &IndexQuery) -> DbResult<Vec<Value>> {
        let mut matched: Vec<Value> = self
            .read()
            .iter()
            .filter(|((k, _), record)| *k == kind && query.matches(record))
            .map(|(_, record)| record.clone())
            .collect();
        query.arrange(kind, &mut matched);
        Ok(matched)
    }

    async fn update_fields(
        &self,
        kind: RecordKind,
        key: &str,
        updates: &[FieldUpdate],
        condition: Option<&Condition>,
    ) -> DbResult<Value> {
        let mut table = self.write();
        let record = table
            .get_mut(&(kind, key.to_string()))
            .ok_or_else(|| DbError::NotFound {
                kind,
                key: key.to_string(),
            })?;
        if let Some(condition) = condition {
            condition
                .check(record)
                .map_err(|message| DbError::ConditionFailed {
                    kind,
                    key: key.to_string(),
                    message,
                })?;
        }
        apply_updates(record, updates);
        Ok(record.clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
