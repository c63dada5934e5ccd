//! Filesystem-backed object store
//!
//! Objects live at `<root>/<bucket>/<key>`. Useful for running the builder and
//! the preprocessing job against a local mirror of the buckets.

use crate::storage::{normalize_key, ObjectStore, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local path of an object
    ///
    /// Buckets are single path components and keys may not climb out of
    /// their bucket, so every path stays under the root.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let key = normalize_key(key);
        let bucket_ok = !bucket.is_empty() && !bucket.contains('/') && bucket != "." && bucket != "..";
        let key_ok = !key.is_empty() && key.split('/').all(|segment| segment != "..");
        if !bucket_ok || !key_ok {
            return Err(StoreError::InvalidKey {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, key)?;
        debug!("Reading {}", path.display());
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            ErrorKind::PermissionDenied => StoreError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => StoreError::Io(e),
        })
    }

    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!("Writing {} bytes to {}", body.len(), path.display());
        tokio::fs::write(&path, body).await?;
        Ok(())
    }
}
