//! `aws` subprocess runner

use crate::aws::AwsCliConfig;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Failure of a single `aws` invocation
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to spawn aws: {0}")]
    Spawn(String),

    #[error("aws timed out after {0} seconds")]
    Timeout(u64),

    #[error("aws exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },
}

/// Coarse classification of an `aws` error message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    AccessDenied,
    AlreadyExists,
    Other,
}

impl CliError {
    /// Classify the failure from the CLI's stderr
    pub fn kind(&self) -> FailureKind {
        match self {
            CliError::Failed { stderr, .. } => classify(stderr),
            _ => FailureKind::Other,
        }
    }
}

/// Classify an `aws` CLI error message
pub fn classify(stderr: &str) -> FailureKind {
    const NOT_FOUND: &[&str] = &[
        "(404)",
        "NoSuchKey",
        "NoSuchBucket",
        "ResourceNotFound",
        "does not exist",
    ];
    const ACCESS_DENIED: &[&str] = &[
        "(403)",
        "AccessDenied",
        "Forbidden",
        "UnauthorizedOperation",
        "not authorized",
    ];
    const ALREADY_EXISTS: &[&str] = &["ResourceInUse", "already exists"];

    if ALREADY_EXISTS.iter().any(|p| stderr.contains(p)) {
        FailureKind::AlreadyExists
    } else if ACCESS_DENIED.iter().any(|p| stderr.contains(p)) {
        FailureKind::AccessDenied
    } else if NOT_FOUND.iter().any(|p| stderr.contains(p)) {
        FailureKind::NotFound
    } else {
        FailureKind::Other
    }
}

/// Runs the `aws` executable with a timeout
#[derive(Debug, Clone)]
pub struct AwsCli {
    executable: String,
    region: Option<String>,
    timeout_secs: u64,
}

impl AwsCli {
    pub fn new(config: AwsCliConfig) -> Self {
        Self {
            executable: config.executable.unwrap_or_else(|| "aws".to_string()),
            region: config.region,
            timeout_secs: config.timeout_secs,
        }
    }

    #[cfg(test)]
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Full argument list for a call, including the region flag
    pub fn command_args(&self, args: &[&str]) -> Vec<String> {
        let mut full: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        if let Some(region) = &self.region {
            full.push("--region".to_string());
            full.push(region.clone());
        }
        full
    }

    /// Run `aws <args>` and return stdout
    pub async fn run(&self, args: &[&str]) -> Result<Vec<u8>, CliError> {
        self.run_with_input(args, None).await
    }

    /// Run `aws <args>`, optionally feeding `input` on stdin, and return stdout
    pub async fn run_with_input(
        &self,
        args: &[&str],
        input: Option<&[u8]>,
    ) -> Result<Vec<u8>, CliError> {
        let full = self.command_args(args);
        debug!("Running {} {}", self.executable, full.join(" "));

        let mut child = Command::new(&self.executable)
            .args(&full)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CliError::Spawn(e.to_string()))?;

        // The stdin write counts against the timeout
        let stdin = child.stdin.take();
        let run = async move {
            if let (Some(bytes), Some(mut stdin)) = (input, stdin) {
                stdin
                    .write_all(bytes)
                    .await
                    .map_err(|e| CliError::Spawn(format!("Failed to write stdin: {}", e)))?;
            }
            child
                .wait_with_output()
                .await
                .map_err(|e| CliError::Spawn(e.to_string()))
        };

        let output = timeout(Duration::from_secs(self.timeout_secs), run)
            .await
            .map_err(|_| CliError::Timeout(self.timeout_secs))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code().unwrap_or(-1);
            warn!("aws exited with code {}: {}", code, stderr);
            return Err(CliError::Failed { code, stderr });
        }

        debug!("aws returned {} bytes of output", output.stdout.len());
        Ok(output.stdout)
    }
}
