//! Thin wrapper around the `aws` command-line tool
//!
//! Both the object store and the platform client talk to the cloud through
//! the `aws` CLI as a subprocess, so credentials and sessions stay whatever the
//! caller's environment already provides.

pub mod subprocess;

pub use subprocess::{AwsCli, CliError, FailureKind};

/// Configuration for the `aws` CLI runner
#[derive(Debug, Clone)]
pub struct AwsCliConfig {
    /// Path to the `aws` executable (defaults to "aws" on PATH)
    pub executable: Option<String>,

    /// Region passed as `--region` to every call
    pub region: Option<String>,

    /// Timeout for a single invocation in seconds
    pub timeout_secs: u64,
}

impl Default for AwsCliConfig {
    fn default() -> Self {
        Self {
            executable: None,
            region: None,
            timeout_secs: 300,
        }
    }
}

impl AwsCliConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, executable: String) -> Self {
        self.executable = Some(executable);
        self
    }

    pub fn with_region(mut self, region: String) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
