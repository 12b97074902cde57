use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{validate_key, Blob, BlobMetadata, ObjectStore, UrlSigner, META_SUFFIX};
use crate::{DbError, DbResult};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    #[serde(default)]
    metadata: BlobMetadata,
}

/// Blobs as files under a root directory. Content type and metadata go in a
/// `<file>.meta.json` sidecar.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    signer: UrlSigner,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, signer: UrlSigner) -> DbResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, signer })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> DbResult<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }

    fn sidecar_for(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_blob(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: BlobMetadata,
    ) -> DbResult<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = bytes.len();
        tokio::fs::write(&path, bytes).await?;
        let sidecar = Sidecar {
            content_type: content_type.to_string(),
            metadata,
        };
        tokio::fs::write(Self::sidecar_for(&path), serde_json::to_vec(&sidecar)?).await?;
        debug!(key, size, "blob stored");
        Ok(key.to_string())
    }

    async fn get_blob(&self, key: &str) -> DbResult<Blob> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DbError::BlobNotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let sidecar = match tokio::fs::read(Self::sidecar_for(&path)).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Sidecar {
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                metadata: BlobMetadata::new(),
            },
            Err(e) => return Err(e.into()),
        };
        Ok(Blob {
            bytes,
            content_type: sidecar.content_type,
            metadata: sidecar.metadata,
        })
    }

    async fn list(&self, prefix: &str) -> DbResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];
        while let Some((dir, rel)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = if rel.is_empty() {
                    name.clone()
                } else {
                    format!("{rel}/{name}")
                };
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), key));
                } else if !name.ends_with(META_SUFFIX) && key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    fn name(&self) -> &str {
        "local"
    }
}
