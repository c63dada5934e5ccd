//! Platform client that calls `aws sagemaker` and `aws sts`

use crate::aws::{AwsCli, AwsCliConfig, CliError, FailureKind};
use crate::platform::{role_arn_from_identity, PlatformClient, PlatformError, Tag, UpsertRequest};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListTagsResponse {
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PipelineArnResponse {
    pipeline_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    arn: String,
}

/// Platform client backed by the `aws` CLI
#[derive(Debug, Clone)]
pub struct AwsCliPlatform {
    cli: AwsCli,
}

impl AwsCliPlatform {
    pub fn new(config: AwsCliConfig) -> Self {
        Self {
            cli: AwsCli::new(config),
        }
    }

    fn map_error(err: CliError, resource: &str) -> PlatformError {
        match err.kind() {
            FailureKind::NotFound => PlatformError::NotFound(resource.to_string()),
            FailureKind::AccessDenied => PlatformError::AccessDenied(resource.to_string()),
            _ => match err {
                CliError::Timeout(secs) => PlatformError::Timeout(secs),
                CliError::Spawn(msg) => PlatformError::Internal(msg),
                other => PlatformError::Api(other.to_string()),
            },
        }
    }

    async fn run_json<T: for<'de> Deserialize<'de>>(
        &self,
        args: &[&str],
        resource: &str,
    ) -> Result<T, PlatformError> {
        let stdout = self
            .cli
            .run(args)
            .await
            .map_err(|e| Self::map_error(e, resource))?;
        serde_json::from_slice(&stdout)
            .map_err(|e| PlatformError::Internal(format!("Failed to decode aws output: {}", e)))
    }
}

#[async_trait]
impl PlatformClient for AwsCliPlatform {
    async fn list_tags(&self, resource_arn: &str) -> Result<Vec<Tag>, PlatformError> {
        let response: ListTagsResponse = self
            .run_json(
                &["sagemaker", "list-tags", "--resource-arn", resource_arn, "--output", "json"],
                resource_arn,
            )
            .await?;
        Ok(response.tags)
    }

    async fn upsert_pipeline(&self, request: &UpsertRequest) -> Result<String, PlatformError> {
        let token = Uuid::new_v4().to_string();
        let tags = serde_json::to_string(&request.tags)
            .map_err(|e| PlatformError::Internal(e.to_string()))?;

        let mut create = vec![
            "sagemaker",
            "create-pipeline",
            "--pipeline-name",
            request.pipeline_name.as_str(),
            "--pipeline-definition",
            request.definition.as_str(),
            "--role-arn",
            request.role_arn.as_str(),
            "--client-request-token",
            token.as_str(),
            "--output",
            "json",
        ];
        if !request.tags.is_empty() {
            create.extend(["--tags", tags.as_str()]);
        }

        match self.cli.run(&create).await {
            Ok(stdout) => {
                let response: PipelineArnResponse = serde_json::from_slice(&stdout).map_err(|e| {
                    PlatformError::Internal(format!("Failed to decode aws output: {}", e))
                })?;
                info!("Created pipeline {}", response.pipeline_arn);
                Ok(response.pipeline_arn)
            }
            Err(e) if e.kind() == FailureKind::AlreadyExists => {
                info!("Pipeline {} exists, updating", request.pipeline_name);
                let response: PipelineArnResponse = self
                    .run_json(
                        &[
                            "sagemaker",
                            "update-pipeline",
                            "--pipeline-name",
                            request.pipeline_name.as_str(),
                            "--pipeline-definition",
                            request.definition.as_str(),
                            "--role-arn",
                            request.role_arn.as_str(),
                            "--output",
                            "json",
                        ],
                        &request.pipeline_name,
                    )
                    .await?;
                Ok(response.pipeline_arn)
            }
            Err(e) => Err(Self::map_error(e, &request.pipeline_name)),
        }
    }

    async fn caller_role_arn(&self) -> Result<String, PlatformError> {
        let identity: CallerIdentity = self
            .run_json(&["sts", "get-caller-identity", "--output", "json"], "caller identity")
            .await?;
        role_arn_from_identity(&identity.arn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_errors() {
        let denied = CliError::Failed {
            code: 254,
            stderr: "An error occurred (AccessDeniedException) when calling the ListTags operation"
                .to_string(),
        };
        assert!(matches!(
            AwsCliPlatform::map_error(denied, "arn"),
            PlatformError::AccessDenied(_)
        ));

        let throttled = CliError::Failed {
            code: 254,
            stderr: "An error occurred (ThrottlingException): Rate exceeded".to_string(),
        };
        assert!(matches!(
            AwsCliPlatform::map_error(throttled, "arn"),
            PlatformError::Api(_)
        ));

        assert!(matches!(
            AwsCliPlatform::map_error(CliError::Spawn("no aws".to_string()), "arn"),
            PlatformError::Internal(_)
        ));
    }

    #[test]
    fn test_decode_list_tags() {
        let response: ListTagsResponse = serde_json::from_str(
            r#"{"Tags": [{"Key": "sagemaker:project-name", "Value": "abalone"}]}"#,
        )
        .unwrap();
        assert_eq!(response.tags, vec![Tag::new("sagemaker:project-name", "abalone")]);

        let empty: ListTagsResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.tags.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires aws CLI and credentials
    async fn test_caller_role() {
        let platform = AwsCliPlatform::new(AwsCliConfig::default());
        assert!(platform.caller_role_arn().await.is_ok());
    }
}
