//! Local execution plan - which steps the engine would run for given reports

use crate::core::{PipelineDefinition, Step, StepKind};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Property-file contents, keyed by producing step and file name
#[derive(Debug, Clone, Default)]
pub struct ReportSet {
    reports: HashMap<(String, String), Value>,
}

impl ReportSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, step_name: &str, property_file: &str, report: Value) -> Self {
        self.reports
            .insert((step_name.to_string(), property_file.to_string()), report);
        self
    }

    pub fn get(&self, step_name: &str, property_file: &str) -> Option<&Value> {
        self.reports
            .get(&(step_name.to_string(), property_file.to_string()))
    }
}

/// A step the engine would run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub name: String,
    pub step_type: &'static str,
    /// Condition step whose branch selected this step
    pub branch_of: Option<String>,
}

/// Result of evaluating one condition step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionOutcome {
    pub step_name: String,
    pub satisfied: bool,
}

/// Ordered list of the steps that would run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionPlan {
    pub steps: Vec<PlannedStep>,
    pub conditions: Vec<ConditionOutcome>,
}

impl ExecutionPlan {
    /// Walk the graph in dependency order, taking each condition's branch
    pub fn resolve(definition: &PipelineDefinition, reports: &ReportSet) -> Result<Self> {
        let mut plan = ExecutionPlan::default();
        let mut finished = HashSet::new();

        for name in definition.execution_order() {
            let step = definition
                .step(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown step in execution order: {}", name))?;
            if !step.dependencies_met(&finished) {
                anyhow::bail!("Step '{}' is not runnable: unmet dependencies", step.name);
            }
            plan.add(step, None, reports)?;
            finished.insert(step.name.clone());
        }

        Ok(plan)
    }

    fn add(&mut self, step: &Step, branch_of: Option<&str>, reports: &ReportSet) -> Result<()> {
        self.steps.push(PlannedStep {
            name: step.name.clone(),
            step_type: step.type_name(),
            branch_of: branch_of.map(str::to_string),
        });

        if let StepKind::Condition(args) = &step.kind {
            let mut satisfied = true;
            for condition in &args.conditions {
                let left = &condition.left;
                let report = reports
                    .get(&left.step_name, &left.property_file)
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "No {} report from step '{}' for condition '{}'",
                            left.property_file,
                            left.step_name,
                            step.name
                        )
                    })?;
                let holds = condition
                    .evaluate(report)
                    .with_context(|| format!("Failed to evaluate condition '{}'", step.name))?;
                debug!("Condition {} {} -> {}", step.name, condition.comparator.as_str(), holds);
                satisfied &= holds;
            }

            self.conditions.push(ConditionOutcome {
                step_name: step.name.clone(),
                satisfied,
            });

            let branch = if satisfied { &args.if_steps } else { &args.else_steps };
            for inner in branch {
                self.add(inner, Some(step.name.as_str()), reports)?;
            }
        }

        Ok(())
    }

    /// Whether a step would run
    pub fn will_run(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name == name)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildOptions, PipelineBuilder, EVAL_STEP, EVALUATION_REPORT, REGISTER_STEP};
    use crate::core::PipelineConfig;
    use serde_json::json;

    fn definition() -> PipelineDefinition {
        let config = PipelineConfig::from_json(
            r#"{
                "ProcessingInstanceCount": 1,
                "ProcessingInstanceType": "ml.m5.xlarge",
                "TrainingInstanceType": "ml.m5.xlarge",
                "ModelApprovalStatus": "PendingManualApproval",
                "InputDataBucket": "s3://in",
                "OutputDataBucket": "s3://out/data/"
            }"#,
        )
        .unwrap();
        let options = BuildOptions::new("us-east-1");
        PipelineBuilder::new(&options, &config).unwrap().build().unwrap()
    }

    fn plan_for(similarity: Value) -> Result<ExecutionPlan> {
        let reports = ReportSet::new().with(
            EVAL_STEP,
            EVALUATION_REPORT,
            json!({ "Similarity": similarity }),
        );
        ExecutionPlan::resolve(&definition(), &reports)
    }

    #[test]
    fn test_registers_above_threshold() {
        let plan = plan_for(json!(0.93)).unwrap();
        assert_eq!(
            plan.step_names(),
            vec!["DataProcessing", "TrainModel", "Eval", "SimilarityEvalCondition", "RegisterModel"]
        );
        let register = plan.steps.last().unwrap();
        assert_eq!(register.step_type, "RegisterModel");
        assert_eq!(register.branch_of.as_deref(), Some("SimilarityEvalCondition"));
        assert!(plan.conditions[0].satisfied);
    }

    #[test]
    fn test_registers_at_threshold() {
        assert!(plan_for(json!(0.9)).unwrap().will_run(REGISTER_STEP));
    }

    #[test]
    fn test_skips_registration_below_threshold() {
        let plan = plan_for(json!(0.8999)).unwrap();
        assert!(!plan.will_run(REGISTER_STEP));
        assert!(plan.will_run("SimilarityEvalCondition"));
        assert!(!plan.conditions[0].satisfied);
    }

    #[test]
    fn test_missing_report_fails() {
        assert!(ExecutionPlan::resolve(&definition(), &ReportSet::new()).is_err());
    }

    #[test]
    fn test_non_numeric_similarity_fails() {
        assert!(plan_for(json!("excellent")).is_err());
    }
}
