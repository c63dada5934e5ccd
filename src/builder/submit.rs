//! Build the pipeline and create or update it on the platform

use crate::builder::{get_pipeline, pipeline_custom_tags, BuildOptions};
use crate::platform::{PlatformClient, Tag, UpsertRequest};
use crate::storage::ObjectStore;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// What was submitted
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionSummary {
    pub pipeline_arn: String,
    pub pipeline_name: String,
    pub step_count: usize,
    pub tags: Vec<Tag>,
    pub submitted_at: DateTime<Utc>,
}

/// Build, gather tags, resolve the role and upsert the pipeline
pub async fn submit_pipeline(
    store: &dyn ObjectStore,
    platform: &dyn PlatformClient,
    options: &BuildOptions,
    tags: Vec<Tag>,
    project_arn: Option<&str>,
) -> Result<SubmissionSummary> {
    let role_arn = match &options.role {
        Some(role) => role.clone(),
        None => platform
            .caller_role_arn()
            .await
            .context("No execution role given and the caller's role could not be resolved")?,
    };
    let options = BuildOptions {
        role: Some(role_arn.clone()),
        ..options.clone()
    };

    let definition = get_pipeline(store, &options).await?;
    if let Some(step) = definition.all_steps().into_iter().find(|s| s.missing_image()) {
        bail!(
            "Step {} has no container image; the role {} names no account, pass --preprocess-image",
            step.name,
            role_arn
        );
    }
    let tags = pipeline_custom_tags(platform, tags, project_arn).await?;

    let request = UpsertRequest {
        pipeline_name: definition.name.clone(),
        definition: definition.to_json()?,
        role_arn,
        tags: tags.clone(),
    };
    let pipeline_arn = platform
        .upsert_pipeline(&request)
        .await
        .with_context(|| format!("Failed to submit pipeline {}", definition.name))?;

    info!("Submitted {} as {}", definition.name, pipeline_arn);
    Ok(SubmissionSummary {
        pipeline_arn,
        pipeline_name: definition.name.clone(),
        step_count: definition.steps.len(),
        tags,
        submitted_at: Utc::now(),
    })
}
