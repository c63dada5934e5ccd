//! mlpipeline - builds a managed ML pipeline and runs its preprocessing job

pub mod aws;
pub mod builder;
pub mod cli;
pub mod core;
pub mod execution;
pub mod platform;
pub mod preprocess;
pub mod storage;

// Re-export commonly used types
pub use builder::{get_pipeline, submit_pipeline, BuildOptions, PipelineBuilder};
pub use core::{ConfigSource, Condition, PipelineConfig, PipelineDefinition, Step, StepKind, StorageUri};
pub use execution::{ExecutionPlan, ReportSet};
pub use platform::{PlatformClient, PlatformError, Tag};
pub use storage::{InMemoryStore, LocalStore, ObjectStore, StoreError};
