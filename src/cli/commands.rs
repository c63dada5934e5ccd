//! CLI command definitions

use crate::builder::BuildOptions;
use crate::core::config::{ConfigSource, DEFAULT_BUCKET, DEFAULT_CONFIG_KEY};
use crate::core::StorageUri;
use crate::preprocess::{PreprocessOptions, DEFAULT_WORK_DIR, SOURCE_OBJECT_KEY};
use clap::Args;
use std::path::PathBuf;

/// Options shared by every command that builds the pipeline
#[derive(Debug, Args, Clone)]
pub struct BuildArgs {
    /// Bucket holding the configuration object
    #[arg(long, default_value = DEFAULT_BUCKET)]
    pub config_bucket: String,

    /// Key of the configuration object
    #[arg(long, default_value = DEFAULT_CONFIG_KEY)]
    pub config_key: String,

    /// Execution role ARN
    #[arg(long)]
    pub role: Option<String>,

    /// Bucket for training output
    #[arg(long)]
    pub default_bucket: Option<String>,

    /// Pipeline name
    #[arg(long, default_value = "AbalonePipeline")]
    pub pipeline_name: String,

    /// Image for training, evaluation and serving (looked up by region if omitted)
    #[arg(long)]
    pub framework_image: Option<String>,

    /// Image that runs the preprocess command (derived from the role if omitted)
    #[arg(long)]
    pub preprocess_image: Option<String>,
}

impl BuildArgs {
    pub fn to_options(&self, region: &str) -> BuildOptions {
        let mut options = BuildOptions::new(region)
            .with_pipeline_name(self.pipeline_name.clone())
            .with_config_source(ConfigSource {
                bucket: self.config_bucket.clone(),
                key: self.config_key.clone(),
            });
        if let Some(role) = &self.role {
            options = options.with_role(role.clone());
        }
        if let Some(bucket) = &self.default_bucket {
            options = options.with_default_bucket(bucket.clone());
        }
        if let Some(image) = &self.framework_image {
            options = options.with_framework_image(image.clone());
        }
        if let Some(image) = &self.preprocess_image {
            options = options.with_preprocess_image(image.clone());
        }
        options
    }
}

/// Build the pipeline definition
#[derive(Debug, Args, Clone)]
pub struct BuildCommand {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Write the definition to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pretty-print the definition
    #[arg(long)]
    pub pretty: bool,
}

/// Build and submit the pipeline
#[derive(Debug, Args, Clone)]
pub struct SubmitCommand {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Project whose tags are copied onto the pipeline
    #[arg(long)]
    pub project_arn: Option<String>,

    /// Extra tags (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub tag: Vec<(String, String)>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run the preprocessing job
#[derive(Debug, Args, Clone)]
pub struct PreprocessCommand {
    /// Location of the raw input data
    #[arg(long)]
    pub input_data: StorageUri,

    /// Location the processed data is published under
    #[arg(long)]
    pub output_data: StorageUri,

    /// Local working directory
    #[arg(long, default_value = DEFAULT_WORK_DIR)]
    pub work_dir: PathBuf,

    /// Bucket the processed file is uploaded to
    #[arg(long, default_value = DEFAULT_BUCKET)]
    pub artifact_bucket: String,

    /// Key of the source object in the input bucket
    #[arg(long, default_value = SOURCE_OBJECT_KEY)]
    pub source_key: String,

    /// Don't archive the raw download
    #[arg(long)]
    pub no_archive: bool,

    /// Min-max scale the popularity column
    #[arg(long)]
    pub normalize: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl PreprocessCommand {
    pub fn to_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            work_dir: self.work_dir.clone(),
            artifact_bucket: self.artifact_bucket.clone(),
            source_key: self.source_key.clone(),
            archive_raw: !self.no_archive,
            normalize: self.normalize,
            ..PreprocessOptions::new(self.input_data.clone(), self.output_data.clone())
        }
    }
}

/// Resolve the steps that would run
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Evaluation report JSON file
    #[arg(short, long)]
    pub report: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a configuration file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to configuration JSON file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("a=b=c"),
            Ok(("a".to_string(), "b=c".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
    }
}
