// crates/db/src/lib.rs
//! Storage collaborators for applykit.
//!
//! - [`RecordStore`]: key-value storage for jobs, kits and tasks with
//!   secondary-index queries and conditional partial updates. Backed by
//!   SQLite ([`SqliteRecordStore`]) or memory ([`MemoryRecordStore`]).
//! - [`Records`]: typed facade over a record store.
//! - [`ObjectStore`]: blob storage with signed, time-limited retrieval
//!   links. Backed by the filesystem ([`LocalObjectStore`]) or memory
//!   ([`MemoryObjectStore`]).

pub mod blob;
mod migrations;
pub mod numbers;
pub mod record;
mod records;

pub use blob::{
    keys, Blob, BlobMetadata, LocalObjectStore, MemoryObjectStore, ObjectStore, SignatureError,
    UrlSigner,
};
pub use numbers::normalize_numbers;
pub use record::{
    Condition, FieldUpdate, Index, IndexQuery, MemoryRecordStore, RecordKind, RecordStore,
    SortOrder, SqliteRecordStore,
};
pub use records::Records;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Malformed record: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{kind} record not found: {key}")]
    NotFound { kind: RecordKind, key: String },

    #[error("Condition failed on {kind} record {key}: {message}")]
    ConditionFailed {
        kind: RecordKind,
        key: String,
        message: String,
    },

    #[error("{kind} record has no `{field}` key field")]
    MissingKey { kind: RecordKind, field: &'static str },

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Invalid blob key: {0}")]
    InvalidBlobKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to determine data directory")]
    NoDataDir,
}

pub type DbResult<T> = Result<T, DbError>;

/// Default SQLite location: `<data dir>/applykit/applykit.db`.
pub fn default_db_path() -> DbResult<PathBuf> {
    let data_dir = dirs::data_dir().ok_or(DbError::NoDataDir)?;
    Ok(data_dir.join("applykit").join("applykit.db"))
}

/// Default blob root: `<data dir>/applykit/blobs`.
pub fn default_blob_dir() -> DbResult<PathBuf> {
    let data_dir = dirs::data_dir().ok_or(DbError::NoDataDir)?;
    Ok(data_dir.join("applykit").join("blobs"))
}
