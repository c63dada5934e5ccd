//! Preprocessing Job
//!
//! Downloads one CSV from the input bucket, keeps a fixed column set and
//! republishes the result under the artifact bucket twice.

pub mod table;

pub use table::{MinMax, Table};

use crate::core::config::DEFAULT_BUCKET;
use crate::core::uri::StorageUri;
use crate::storage::ObjectStore;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Default local working directory of a processing container
pub const DEFAULT_WORK_DIR: &str = "/opt/ml/processing";

/// Object read from the input bucket
pub const SOURCE_OBJECT_KEY: &str = "csv/part-00000-d409a910-40d0-4943-991b-ce23c113dec8-c000.csv";

/// Where the untouched download is archived
pub const RAW_ARCHIVE_KEY: &str = "dataset/file.csv";

/// Second, fixed destination of the processed file
pub const PROCESSED_KEY: &str = "data/processed.csv";

/// Bounds object used by `normalize`, read from the input bucket
pub const MIN_MAX_KEY: &str = "dataset/min_max_algo_variables.json";

pub const NORMALIZED_COLUMN: &str = "popularity";

/// Columns kept in the processed file, in output order
pub const FEATURE_COLUMNS: [&str; 21] = [
    "popularity",
    "Action",
    "Adventure",
    "Animation",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Family",
    "Fantasy",
    "Foreign",
    "History",
    "Horror",
    "Music",
    "Mystery",
    "Romance",
    "science_fiction",
    "TV_Movie",
    "Thriller",
    "War",
    "Western",
];

/// Arguments of one preprocessing run
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub input_data: StorageUri,
    pub output_data: StorageUri,
    pub work_dir: PathBuf,
    pub artifact_bucket: String,
    pub source_key: String,
    pub archive_raw: bool,
    pub normalize: bool,
}

impl PreprocessOptions {
    pub fn new(input_data: StorageUri, output_data: StorageUri) -> Self {
        Self {
            input_data,
            output_data,
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            artifact_bucket: DEFAULT_BUCKET.to_string(),
            source_key: SOURCE_OBJECT_KEY.to_string(),
            archive_raw: true,
            normalize: false,
        }
    }

    /// Key derived from the output argument: `<second-to-last segment>/processed.csv`
    pub fn derived_output_key(&self) -> String {
        format!("{}/processed.csv", self.output_data.parent_segment())
    }

    fn local_file(&self) -> PathBuf {
        self.work_dir.join("data").join("dataset.csv")
    }
}

/// An object written by the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub bucket: String,
    pub key: String,
}

/// Outcome of a preprocessing run
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessReport {
    pub source: Destination,
    pub rows: usize,
    pub columns: Vec<String>,
    pub destinations: Vec<Destination>,
}

/// Run the preprocessing job end to end
pub async fn run(store: &dyn ObjectStore, options: &PreprocessOptions) -> Result<PreprocessReport> {
    info!("Starting preprocessing");

    let data_dir = options.work_dir.join("data");
    tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let bucket = options.input_data.bucket();
    let local = options.local_file();
    info!("Processing file {} from bucket: {}", options.source_key, bucket);
    let prefix = options.input_data.prefix();
    if !prefix.is_empty() && !options.source_key.starts_with(&format!("{}/", prefix)) {
        warn!("Source key {} is outside input prefix {}", options.source_key, prefix);
    }
    store
        .download_to(bucket, &options.source_key, &local)
        .await
        .with_context(|| format!("Failed to download {}/{}", bucket, options.source_key))?;

    if options.archive_raw {
        store
            .upload_from(&local, &options.artifact_bucket, RAW_ARCHIVE_KEY)
            .await
            .with_context(|| format!("Failed to archive raw input to {}", RAW_ARCHIVE_KEY))?;
        debug!("Archived raw input to {}/{}", options.artifact_bucket, RAW_ARCHIVE_KEY);
    }

    let raw = tokio::fs::read(&local)
        .await
        .with_context(|| format!("Failed to read {}", local.display()))?;
    let mut table = Table::from_csv(&raw)?.select(&FEATURE_COLUMNS)?;

    if options.normalize {
        let bounds = store
            .get(bucket, MIN_MAX_KEY)
            .await
            .with_context(|| format!("Failed to fetch {}/{}", bucket, MIN_MAX_KEY))?;
        let bounds: serde_json::Value =
            serde_json::from_slice(&bounds).context("Bounds object is not valid JSON")?;
        let range = MinMax::from_json(&bounds, NORMALIZED_COLUMN)?;
        info!("Normalizing {} to [{}, {}]", NORMALIZED_COLUMN, range.min, range.max);
        table.normalize(NORMALIZED_COLUMN, range)?;
    }

    tokio::fs::write(&local, table.to_csv()?)
        .await
        .with_context(|| format!("Failed to write {}", local.display()))?;

    let destinations = vec![
        Destination {
            bucket: options.artifact_bucket.clone(),
            key: options.derived_output_key(),
        },
        Destination {
            bucket: options.artifact_bucket.clone(),
            key: PROCESSED_KEY.to_string(),
        },
    ];
    for destination in &destinations {
        store
            .upload_from(&local, &destination.bucket, &destination.key)
            .await
            .with_context(|| {
                format!("Failed to upload {}/{}", destination.bucket, destination.key)
            })?;
        info!("Uploaded {}/{}", destination.bucket, destination.key);
    }

    info!("File preprocessing complete");
    Ok(PreprocessReport {
        source: Destination {
            bucket: bucket.to_string(),
            key: options.source_key.clone(),
        },
        rows: table.row_count(),
        columns: table.headers().to_vec(),
        destinations,
    })
}
