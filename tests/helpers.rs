//! Test utility functions for mlpipeline

#![allow(dead_code)]

use async_trait::async_trait;
use mlpipeline::core::config::{DEFAULT_BUCKET, DEFAULT_CONFIG_KEY};
use mlpipeline::platform::{PlatformClient, PlatformError, Tag, UpsertRequest};
use mlpipeline::preprocess::FEATURE_COLUMNS;
use mlpipeline::storage::InMemoryStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SAMPLE_CONFIG: &str = r#"{
    "ProcessingInstanceCount": 2,
    "ProcessingInstanceType": "ml.c5.xlarge",
    "TrainingInstanceType": "ml.m5.2xlarge",
    "ModelApprovalStatus": "PendingManualApproval",
    "InputDataBucket": "s3://raw-movies/csv",
    "OutputDataBucket": "s3://model-artifacts/data/"
}"#;

/// Store holding `SAMPLE_CONFIG` at the default config location
pub fn store_with_config(config: &str) -> InMemoryStore {
    let store = InMemoryStore::new();
    store.insert(DEFAULT_BUCKET, DEFAULT_CONFIG_KEY, config);
    store
}

/// CSV with every feature column plus a few the job drops
///
/// Extra columns are interleaved so the output order only comes out right
/// when the job reorders by the feature list.
pub fn movies_csv(rows: usize) -> String {
    let mut headers = vec!["id", "title"];
    headers.extend(FEATURE_COLUMNS.iter().rev());
    headers.push("release_date");

    let mut out = headers.join(",");
    out.push('\n');
    for i in 0..rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| match *h {
                "id" => i.to_string(),
                "title" => format!("Movie {}", i),
                "release_date" => "2001-01-01".to_string(),
                "popularity" => format!("{}", 10 * (i + 1)),
                _ => ((i % 2) as u8).to_string(),
            })
            .collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

/// Mock platform that records upserts and returns canned tag responses
pub struct MockPlatform {
    tags: Mutex<Option<Result<Vec<Tag>, PlatformError>>>,
    caller_role: Option<String>,
    upserts: Arc<Mutex<Vec<UpsertRequest>>>,
    list_calls: Arc<AtomicUsize>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            tags: Mutex::new(Some(Ok(Vec::new()))),
            caller_role: None,
            upserts: Arc::new(Mutex::new(Vec::new())),
            list_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_project_tags(self, tags: Vec<Tag>) -> Self {
        *self.tags.lock().unwrap() = Some(Ok(tags));
        self
    }

    pub fn with_tag_error(self, error: PlatformError) -> Self {
        *self.tags.lock().unwrap() = Some(Err(error));
        self
    }

    pub fn with_caller_role(mut self, role: &str) -> Self {
        self.caller_role = Some(role.to_string());
        self
    }

    pub fn upserts(&self) -> Vec<UpsertRequest> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn list_tags(&self, _resource_arn: &str) -> Result<Vec<Tag>, PlatformError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.tags
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(PlatformError::Internal("MockPlatform: tags already taken".to_string())))
    }

    async fn upsert_pipeline(&self, request: &UpsertRequest) -> Result<String, PlatformError> {
        self.upserts.lock().unwrap().push(request.clone());
        Ok(format!(
            "arn:aws:sagemaker:us-east-1:123456789012:pipeline/{}",
            request.pipeline_name.to_lowercase()
        ))
    }

    async fn caller_role_arn(&self) -> Result<String, PlatformError> {
        self.caller_role
            .clone()
            .ok_or_else(|| PlatformError::AccessDenied("MockPlatform: no caller identity".to_string()))
    }
}
