//! Client for the managed ML platform that runs the pipeline

pub mod aws_cli;

pub use aws_cli::AwsCliPlatform;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for platform operations
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Key/value tag attached to platform resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Everything needed to create or update a pipeline
#[derive(Debug, Clone)]
pub struct UpsertRequest {
    pub pipeline_name: String,
    pub definition: String,
    pub role_arn: String,
    pub tags: Vec<Tag>,
}

/// Trait for the execution platform - allows for different implementations
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Tags attached to a resource
    async fn list_tags(&self, resource_arn: &str) -> Result<Vec<Tag>, PlatformError>;

    /// Create the pipeline, or update it if it already exists; returns its ARN
    async fn upsert_pipeline(&self, request: &UpsertRequest) -> Result<String, PlatformError>;

    /// Role ARN of the current caller, used when no execution role is given
    async fn caller_role_arn(&self) -> Result<String, PlatformError>;
}

/// Turn a caller identity ARN into the IAM role ARN it was assumed from
///
/// `arn:aws:sts::123:assumed-role/Role/session` becomes
/// `arn:aws:iam::123:role/Role`. IAM role and user ARNs pass through.
pub fn role_arn_from_identity(identity_arn: &str) -> Result<String, PlatformError> {
    let parts: Vec<&str> = identity_arn.splitn(6, ':').collect();
    if parts.len() != 6 || parts[0] != "arn" {
        return Err(PlatformError::Internal(format!(
            "Unrecognised caller identity ARN: {}",
            identity_arn
        )));
    }
    let (partition, service, account, resource) = (parts[1], parts[2], parts[4], parts[5]);

    match service {
        "iam" => Ok(identity_arn.to_string()),
        "sts" => {
            let mut segments = resource.split('/');
            match (segments.next(), segments.next()) {
                (Some("assumed-role"), Some(role)) if !role.is_empty() => {
                    Ok(format!("arn:{}:iam::{}:role/{}", partition, account, role))
                }
                _ => Err(PlatformError::Internal(format!(
                    "Caller identity is not an assumed role: {}",
                    identity_arn
                ))),
            }
        }
        _ => Err(PlatformError::Internal(format!(
            "Unrecognised caller identity ARN: {}",
            identity_arn
        ))),
    }
}
