//! Blob storage for resumes, cover letters, screenshots and raw artifacts.

mod local;
mod memory;
mod signer;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use signer::{SignatureError, UrlSigner};

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{DbError, DbResult};

/// User metadata stored next to a blob.
pub type BlobMetadata = BTreeMap<String, String>;

/// Suffix of the metadata sidecar `LocalObjectStore` writes; reserved.
pub(crate) const META_SUFFIX: &str = ".meta.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub metadata: BlobMetadata,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing blob. Returns the key.
    async fn put_blob(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: BlobMetadata,
    ) -> DbResult<String>;

    /// Fails with [`DbError::BlobNotFound`] for unknown keys.
    async fn get_blob(&self, key: &str) -> DbResult<Blob>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> DbResult<Vec<String>>;

    fn signer(&self) -> &UrlSigner;

    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Time-limited retrieval link for `key`. Does not check that the blob
    /// exists.
    fn presigned_url(&self, key: &str, ttl_secs: u64) -> DbResult<String> {
        validate_key(key)?;
        Ok(self
            .signer()
            .presign(key, ttl_secs, chrono::Utc::now().timestamp()))
    }
}

/// Keys are relative, `/`-separated paths without traversal segments.
pub fn validate_key(key: &str) -> DbResult<()> {
    let invalid = |reason: &str| Err(DbError::InvalidBlobKey(format!("{key:?}: {reason}")));
    if key.is_empty() {
        return invalid("empty");
    }
    if key.starts_with('/') {
        return invalid("must be relative");
    }
    if key.contains('\\') {
        return invalid("backslash not allowed");
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return invalid("empty or dot segment");
    }
    if key.ends_with(META_SUFFIX) {
        return invalid("reserved suffix");
    }
    Ok(())
}

/// Key layouts for the blobs the workflows write.
///
/// Caller-supplied ids become single path segments. The Unix timestamp is
/// always the last `_`-separated field of the file stem.
pub mod keys {
    use uuid::Uuid;

    /// `raw` as one path segment: `/` and other reserved characters are
    /// percent-encoded, so distinct ids never share a directory.
    pub fn segment(raw: &str) -> String {
        urlencoding::encode(raw).into_owned()
    }

    fn nonce() -> String {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        id
    }

    /// Unique per call, even for uploads in the same second.
    pub fn resume(owner: &str, ts: i64) -> String {
        format!("resumes/{}/resume_{}_{ts}.pdf", segment(owner), nonce())
    }

    /// The Unix timestamp embedded in a key written by this module.
    pub fn timestamp(key: &str) -> Option<i64> {
        let file = key.rsplit('/').next()?;
        let stem = file.split('.').next()?;
        stem.rsplit('_').next()?.parse().ok()
    }

    /// Prefix under which an owner's resumes live.
    pub fn resume_prefix(owner: &str) -> String {
        format!("resumes/{}/", segment(owner))
    }

    pub fn cover_letter(owner: &str, job_id: &str, ts: i64) -> String {
        format!(
            "cover-letters/{}/{}_{}_{ts}.txt",
            segment(owner),
            segment(job_id),
            nonce()
        )
    }

    /// `index` is the screenshot's position within the run.
    pub fn screenshot(task_id: &str, index: usize, step: &str, ts: i64) -> String {
        format!(
            "screenshots/{}/{index:02}_{}_{ts}.png",
            segment(task_id),
            segment(step)
        )
    }

    pub fn artifact(artifact_type: &str, reference: &str, ts: i64) -> String {
        format!("artifacts/{artifact_type}/{reference}_{ts}.json")
    }
}
