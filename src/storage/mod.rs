//! Object storage used for the configuration object and job artifacts

pub mod aws_cli;
pub mod local;
pub mod memory;

pub use aws_cli::AwsCliStore;
pub use local::LocalStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Error types for storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Access denied: {bucket}/{key}")]
    AccessDenied { bucket: String, key: String },

    #[error("Invalid object location: {bucket}/{key}")]
    InvalidKey { bucket: String, key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage command failed: {0}")]
    Command(String),

    #[error("Storage operation timed out after {0} seconds")]
    Timeout(u64),
}

/// Trait for object stores - allows for different backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read a whole object
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write a whole object, replacing any existing one
    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), StoreError>;

    /// Download an object into a local file
    async fn download_to(&self, bucket: &str, key: &str, path: &Path) -> Result<(), StoreError> {
        let body = self.get(bucket, key).await?;
        tokio::fs::write(path, body).await?;
        Ok(())
    }

    /// Upload a local file as an object
    async fn upload_from(&self, path: &Path, bucket: &str, key: &str) -> Result<(), StoreError> {
        let body = tokio::fs::read(path).await?;
        self.put(bucket, key, &body).await
    }
}

/// Strip leading slashes so `/dataset/file.csv` and `dataset/file.csv` name the same object
pub fn normalize_key(key: &str) -> &str {
    key.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("/dataset/file.csv"), "dataset/file.csv");
        assert_eq!(normalize_key("data/processed.csv"), "data/processed.csv");
    }

    #[test]
    fn test_not_found_message_names_object() {
        let err = StoreError::NotFound {
            bucket: "refinedcsv".to_string(),
            key: "configs/configs.json".to_string(),
        };
        assert_eq!(err.to_string(), "Object not found: refinedcsv/configs/configs.json");
    }
}
