use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{validate_key, Blob, BlobMetadata, ObjectStore, UrlSigner};
use crate::{DbError, DbResult};

/// In-memory object store for tests.
#[derive(Debug)]
pub struct MemoryObjectStore {
    blobs: RwLock<BTreeMap<String, Blob>>,
    signer: UrlSigner,
}

impl MemoryObjectStore {
    pub fn new(signer: UrlSigner) -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            signer,
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_blob(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: BlobMetadata,
    ) -> DbResult<String> {
        validate_key(key)?;
        let blob = Blob {
            bytes,
            content_type: content_type.to_string(),
            metadata,
        };
        let mut blobs = self.blobs.write().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned writing blobs: {e}");
            e.into_inner()
        });
        blobs.insert(key.to_string(), blob);
        Ok(key.to_string())
    }

    async fn get_blob(&self, key: &str) -> DbResult<Blob> {
        validate_key(key)?;
        let blobs = self.blobs.read().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned reading blobs: {e}");
            e.into_inner()
        });
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| DbError::BlobNotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> DbResult<Vec<String>> {
        let blobs = self.blobs.read().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned reading blobs: {e}");
            e.into_inner()
        });
        Ok(blobs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_and_prefix_listing() {
        let store = MemoryObjectStore::new(UrlSigner::new("s", "http://x"));
        for key in ["resumes/u1/a.pdf", "resumes/u1/b.pdf", "resumes/u10/c.pdf"] {
            store
                .put_blob(key, key.as_bytes().to_vec(), "application/pdf", BlobMetadata::new())
                .await
                .unwrap();
        }
        assert_eq!(
            store.list("resumes/u1/").await.unwrap(),
            vec!["resumes/u1/a.pdf", "resumes/u1/b.pdf"]
        );
        let blob = store.get_blob("resumes/u10/c.pdf").await.unwrap();
        assert_eq!(blob.bytes, b"resumes/u10/c.pdf");
        assert!(matches!(
            store.get_blob("resumes/u2/x.pdf").await,
            Err(DbError::BlobNotFound(_))
        ));
    }
}
