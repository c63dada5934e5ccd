//! Pipeline configuration loaded from a JSON object in storage

use crate::core::uri::StorageUri;
use crate::storage::ObjectStore;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Bucket holding the configuration object and the pipeline's artifacts
pub const DEFAULT_BUCKET: &str = "refinedcsv";

/// Key of the configuration object inside [`DEFAULT_BUCKET`]
pub const DEFAULT_CONFIG_KEY: &str = "configs/configs.json";

/// Where the configuration object lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub bucket: String,
    pub key: String,
}

impl Default for ConfigSource {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            key: DEFAULT_CONFIG_KEY.to_string(),
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Approval status assigned to a registered model package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelApprovalStatus {
    Approved,
    Rejected,
    PendingManualApproval,
}

impl ModelApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelApprovalStatus::Approved => "Approved",
            ModelApprovalStatus::Rejected => "Rejected",
            ModelApprovalStatus::PendingManualApproval => "PendingManualApproval",
        }
    }
}

/// Tunable pipeline parameters
///
/// Loaded once per build and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineConfig {
    /// Number of instances for the processing and evaluation jobs
    pub processing_instance_count: u32,

    /// Instance type for the processing and evaluation jobs
    pub processing_instance_type: String,

    /// Instance type for the training job
    pub training_instance_type: String,

    /// Approval status given to the registered model
    pub model_approval_status: ModelApprovalStatus,

    /// Location of the raw input data
    pub input_data_bucket: StorageUri,

    /// Location the processed data is published under
    pub output_data_bucket: StorageUri,

    /// Bucket for model packages and processed data (defaults to the config bucket)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_bucket: Option<String>,
}

impl PipelineConfig {
    /// Load and validate the configuration object from storage
    pub async fn load(store: &dyn ObjectStore, source: &ConfigSource) -> Result<Self> {
        info!("Loading pipeline configuration from {}", source);
        let body = store
            .get(&source.bucket, &source.key)
            .await
            .with_context(|| format!("Failed to fetch configuration object {}", source))?;

        let text = String::from_utf8(body)
            .with_context(|| format!("Configuration object {} is not UTF-8", source))?;

        let mut config = Self::from_json(&text)
            .with_context(|| format!("Invalid configuration object {}", source))?;

        if config.artifact_bucket.is_none() {
            config.artifact_bucket = Some(source.bucket.clone());
        }
        debug!("Loaded configuration: {:?}", config);

        Ok(config)
    }

    /// Load pipeline configuration from a local JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse pipeline configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration values
    pub fn validate(&self) -> Result<()> {
        if self.processing_instance_count == 0 {
            anyhow::bail!("ProcessingInstanceCount must be at least 1");
        }

        let instance_type = Regex::new(r"^ml\.[a-z0-9]+\.[a-z0-9]+$")?;
        for (field, value) in [
            ("ProcessingInstanceType", &self.processing_instance_type),
            ("TrainingInstanceType", &self.training_instance_type),
        ] {
            if !instance_type.is_match(value) {
                anyhow::bail!(
                    "{} '{}' is not an instance type (expected ml.<family>.<size>)",
                    field,
                    value
                );
            }
        }

        if let Some(bucket) = &self.artifact_bucket {
            if bucket.is_empty() || bucket.contains('/') {
                anyhow::bail!("ArtifactBucket '{}' is not a bucket name", bucket);
            }
        }

        Ok(())
    }

    /// Bucket holding model packages and processed data
    pub fn artifact_bucket(&self) -> &str {
        self.artifact_bucket.as_deref().unwrap_or(DEFAULT_BUCKET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    const VALID: &str = r#"{
        "ProcessingInstanceCount": 2,
        "ProcessingInstanceType": "ml.m5.xlarge",
        "TrainingInstanceType": "ml.m4.xlarge",
        "ModelApprovalStatus": "PendingManualApproval",
        "InputDataBucket": "s3://smartapps-studio-data-bucket",
        "OutputDataBucket": "s3://smartapps-studio-model-building-bucket/data/"
    }"#;

    #[test]
    fn test_parse_all_fields() {
        let config = PipelineConfig::from_json(VALID).unwrap();
        assert_eq!(config.processing_instance_count, 2);
        assert_eq!(config.processing_instance_type, "ml.m5.xlarge");
        assert_eq!(config.training_instance_type, "ml.m4.xlarge");
        assert_eq!(
            config.model_approval_status,
            ModelApprovalStatus::PendingManualApproval
        );
        assert_eq!(
            config.input_data_bucket.as_str(),
            "s3://smartapps-studio-data-bucket"
        );
        assert_eq!(
            config.output_data_bucket.as_str(),
            "s3://smartapps-studio-model-building-bucket/data/"
        );
        assert_eq!(config.artifact_bucket(), DEFAULT_BUCKET);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = VALID.replace("\"ProcessingInstanceCount\"", "\"Extra\": true, \"ProcessingInstanceCount\"");
        assert!(PipelineConfig::from_json(&json).is_ok());
    }

    #[test]
    fn test_missing_field_fails() {
        let json = r#"{
            "ProcessingInstanceCount": 1,
            "ProcessingInstanceType": "ml.m5.xlarge",
            "TrainingInstanceType": "ml.m4.xlarge",
            "ModelApprovalStatus": "Approved",
            "InputDataBucket": "s3://in"
        }"#;
        let err = PipelineConfig::from_json(json).unwrap_err().to_string();
        assert!(err.contains("OutputDataBucket"), "unexpected error: {}", err);
    }

    #[test]
    fn test_malformed_json_fails() {
        assert!(PipelineConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn test_zero_instances_fails() {
        let json = VALID.replace("\"ProcessingInstanceCount\": 2", "\"ProcessingInstanceCount\": 0");
        assert!(PipelineConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_bad_instance_type_fails() {
        let json = VALID.replace("ml.m4.xlarge", "m4-xlarge");
        let err = PipelineConfig::from_json(&json).unwrap_err().to_string();
        assert!(err.contains("TrainingInstanceType"));
    }

    #[test]
    fn test_bad_approval_status_fails() {
        let json = VALID.replace("PendingManualApproval", "Maybe");
        assert!(PipelineConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_bad_uri_fails() {
        let json = VALID.replace("s3://smartapps-studio-data-bucket", "smartapps-studio-data-bucket");
        assert!(PipelineConfig::from_json(&json).is_err());
    }

    #[tokio::test]
    async fn test_load_defaults_artifact_bucket_to_source() {
        let store = InMemoryStore::new();
        store.insert("my-config-bucket", "configs/configs.json", VALID);
        let source = ConfigSource {
            bucket: "my-config-bucket".to_string(),
            key: DEFAULT_CONFIG_KEY.to_string(),
        };

        let config = PipelineConfig::load(&store, &source).await.unwrap();
        assert_eq!(config.artifact_bucket(), "my-config-bucket");
    }

    #[tokio::test]
    async fn test_load_missing_object_fails() {
        let store = InMemoryStore::new();
        let err = PipelineConfig::load(&store, &ConfigSource::default())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("refinedcsv/configs/configs.json"));
    }

    #[tokio::test]
    async fn test_load_explicit_artifact_bucket_wins() {
        let store = InMemoryStore::new();
        let json = VALID.replace("\"ProcessingInstanceCount\"", "\"ArtifactBucket\": \"artifacts\", \"ProcessingInstanceCount\"");
        store.insert(DEFAULT_BUCKET, DEFAULT_CONFIG_KEY, json);

        let config = PipelineConfig::load(&store, &ConfigSource::default()).await.unwrap();
        assert_eq!(config.artifact_bucket(), "artifacts");
    }
}
