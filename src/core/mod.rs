//! Core domain models
//!
//! This module defines the configuration record, the step descriptors and
//! the step graph that is handed to the execution engine.

pub mod condition;
pub mod config;
pub mod pipeline;
pub mod step;
pub mod uri;

pub use condition::{Comparator, Condition, ConditionError, JsonGet, PropertyFile};
pub use config::{ConfigSource, ModelApprovalStatus, PipelineConfig};
pub use pipeline::PipelineDefinition;
pub use step::{Step, StepKind};
pub use uri::StorageUri;
