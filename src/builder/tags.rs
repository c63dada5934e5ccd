//! Custom tags copied from the owning project onto the pipeline

use crate::platform::{PlatformClient, PlatformError, Tag};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Append the project's tags to `new_tags`
///
/// A project that cannot be found or read is skipped with a warning and the
/// tags gathered so far are returned. Any other failure propagates.
pub async fn pipeline_custom_tags(
    client: &dyn PlatformClient,
    mut new_tags: Vec<Tag>,
    project_arn: Option<&str>,
) -> Result<Vec<Tag>> {
    let Some(arn) = project_arn else {
        return Ok(new_tags);
    };

    match client.list_tags(arn).await {
        Ok(project_tags) => {
            info!("Adding {} project tags from {}", project_tags.len(), arn);
            new_tags.extend(project_tags);
            Ok(new_tags)
        }
        Err(e @ (PlatformError::NotFound(_) | PlatformError::AccessDenied(_))) => {
            warn!("Error getting project tags: {}", e);
            Ok(new_tags)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to list tags for {}", arn)),
    }
}
