use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqliteConnection;
use tracing::info;

use super::{
    apply_updates, created_at, Condition, FieldUpdate, IndexQuery, RecordKind, RecordStore,
    SortOrder,
};
use crate::{migrations, DbError, DbResult};

/// Record store backed by a single SQLite `records` table holding JSON bodies.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteRecordStore {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn new(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            db_path: path.to_owned(),
        };
        store.run_migrations().await?;

        info!("Record store opened at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    ///
    /// Shared-cache table locks do not honour `busy_timeout`, so the pool is
    /// held to one connection that never expires.
    pub async fn new_in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.shared_cache(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self {
            pool,
            db_path: PathBuf::new(),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run all inline migrations, tracked in `_migrations`.
    async fn run_migrations(&self) -> DbResult<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)")
            .execute(&self.pool)
            .await?;

        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;
        let current_version = row.0 as usize;

        for (i, migration) in migrations::MIGRATIONS.iter().enumerate() {
            let version = i + 1;
            if version > current_version {
                sqlx::query(migration).execute(&self.pool).await?;
                sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
                    .bind(version as i64)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Empty for in-memory stores.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn update_locked(
        conn: &mut SqliteConnection,
        kind: RecordKind,
        key: &str,
        updates: &[FieldUpdate],
        condition: Option<&Condition>,
    ) -> DbResult<Value> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM records WHERE kind = ? AND key = ?")
                .bind(kind.as_str())
                .bind(key)
                .fetch_optional(&mut *conn)
                .await?;
        let (body,) = row.ok_or_else(|| DbError::NotFound {
            kind,
            key: key.to_string(),
        })?;
        let mut record: Value = serde_json::from_str(&body)?;

        if let Some(condition) = condition {
            condition
                .check(&record)
                .map_err(|message| DbError::ConditionFailed {
                    kind,
                    key: key.to_string(),
                    message,
                })?;
        }

        apply_updates(&mut record, updates);
        sqlx::query("UPDATE records SET body = ? WHERE kind = ? AND key = ?")
            .bind(serde_json::to_string(&record)?)
            .bind(kind.as_str())
            .bind(key)
            .execute(&mut *conn)
            .await?;
        Ok(record)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn put(&self, kind: RecordKind, record: Value) -> DbResult<()> {
        let key = kind.key_of(&record)?;
        sqlx::query(
            r#"INSERT INTO records (kind, key, body, created_at) VALUES (?, ?, ?, ?)
               ON CONFLICT(kind, key) DO UPDATE SET
                   body = excluded.body,
                   created_at = excluded.created_at"#,
        )
        .bind(kind.as_str())
        .bind(&key)
        .bind(serde_json::to_string(&record)?)
        .bind(created_at(&record))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, kind: RecordKind, key: &str) -> DbResult<Option<Value>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM records WHERE kind = ? AND key = ?")
                .bind(kind.as_str())
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(body,)| serde_json::from_str(&body).map_err(DbError::from))
            .transpose()
    }

    async fn query(&self, kind: RecordKind, query: &IndexQuery) -> DbResult<Vec<Value>> {
        let direction = match query.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let sql = format!(
            "SELECT body FROM records \
             WHERE kind = ? AND json_extract(body, '$.{field}') = ? \
             ORDER BY created_at {direction}, key {direction} \
             LIMIT ?",
            field = query.index.field(),
        );
        // SQLite treats a negative LIMIT as unbounded.
        let limit = query.limit.map(|l| l as i64).unwrap_or(-1);
        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(kind.as_str())
            .bind(&query.key)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|(body,)| serde_json::from_str(&body).map_err(DbError::from))
            .collect()
    }

    async fn update_fields(
        &self,
        kind: RecordKind,
        key: &str,
        updates: &[FieldUpdate],
        condition: Option<&Condition>,
    ) -> DbResult<Value> {
        // IMMEDIATE takes the write lock up front so the condition check and
        // the write see the same row. A dropped transaction rolls back.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let record = Self::update_locked(&mut *tx, kind, key, updates, condition).await?;
        tx.commit().await?;
        Ok(record)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
