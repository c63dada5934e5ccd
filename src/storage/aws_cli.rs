//! S3 object store backed by `aws s3 cp`

use crate::aws::{AwsCli, AwsCliConfig, CliError, FailureKind};
use crate::storage::{normalize_key, ObjectStore, StoreError};
use async_trait::async_trait;
use std::path::Path;

/// Object store that shells out to `aws s3 cp`
#[derive(Debug, Clone)]
pub struct AwsCliStore {
    cli: AwsCli,
}

impl AwsCliStore {
    pub fn new(config: AwsCliConfig) -> Self {
        Self {
            cli: AwsCli::new(config),
        }
    }

    fn object_uri(bucket: &str, key: &str) -> String {
        format!("s3://{}/{}", bucket, normalize_key(key))
    }

    fn map_error(err: CliError, bucket: &str, key: &str) -> StoreError {
        match err.kind() {
            FailureKind::NotFound => StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            FailureKind::AccessDenied => StoreError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => match err {
                CliError::Timeout(secs) => StoreError::Timeout(secs),
                other => StoreError::Command(other.to_string()),
            },
        }
    }
}

#[async_trait]
impl ObjectStore for AwsCliStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let uri = Self::object_uri(bucket, key);
        self.cli
            .run(&["s3", "cp", uri.as_str(), "-"])
            .await
            .map_err(|e| Self::map_error(e, bucket, key))
    }

    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let uri = Self::object_uri(bucket, key);
        self.cli
            .run_with_input(&["s3", "cp", "-", uri.as_str()], Some(body))
            .await
            .map_err(|e| Self::map_error(e, bucket, key))?;
        Ok(())
    }

    async fn download_to(&self, bucket: &str, key: &str, path: &Path) -> Result<(), StoreError> {
        let uri = Self::object_uri(bucket, key);
        let local = path.to_string_lossy();
        self.cli
            .run(&["s3", "cp", uri.as_str(), &*local])
            .await
            .map_err(|e| Self::map_error(e, bucket, key))?;
        Ok(())
    }

    async fn upload_from(&self, path: &Path, bucket: &str, key: &str) -> Result<(), StoreError> {
        let uri = Self::object_uri(bucket, key);
        let local = path.to_string_lossy();
        self.cli
            .run(&["s3", "cp", &*local, uri.as_str()])
            .await
            .map_err(|e| Self::map_error(e, bucket, key))?;
        Ok(())
    }
}
