//! Local view of how the execution engine would run a pipeline

pub mod planner;

pub use planner::{ConditionOutcome, ExecutionPlan, PlannedStep, ReportSet};
