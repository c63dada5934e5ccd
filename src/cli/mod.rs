//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{BuildCommand, PlanCommand, PreprocessCommand, SubmitCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Managed ML pipeline builder and preprocessing job
#[derive(Debug, Parser, Clone)]
#[command(name = "mlpipeline")]
#[command(version = "0.1.0")]
#[command(about = "Builds and submits a managed ML pipeline and runs its preprocessing job", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Cloud region for storage and platform calls
    #[arg(long, global = true, default_value = "us-east-1")]
    pub region: String,

    /// Serve buckets from this local directory instead of the cloud
    #[arg(long, global = true)]
    pub store_root: Option<PathBuf>,

    /// Path to the aws executable
    #[arg(long, global = true)]
    pub aws_path: Option<String>,

    /// Timeout for a single aws call, in seconds
    #[arg(long, global = true, default_value_t = 300)]
    pub aws_timeout: u64,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build the pipeline definition and print it
    Build(BuildCommand),

    /// Build the pipeline and create or update it on the platform
    Submit(SubmitCommand),

    /// Run the preprocessing job
    Preprocess(PreprocessCommand),

    /// Show which steps would run for a given evaluation report
    Plan(PlanCommand),

    /// Validate a local configuration file
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
