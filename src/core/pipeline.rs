//! Pipeline definition - the step graph handed to the execution engine

use crate::core::step::{Step, StepKind};
use anyhow::Result;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Definition format version understood by the execution engine
pub const DEFINITION_VERSION: &str = "2020-12-01";

/// A named step graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineDefinition {
    #[serde(skip)]
    pub name: String,

    pub version: String,

    /// Execution-time parameters (this pipeline takes none)
    pub parameters: Vec<serde_json::Value>,

    /// Top-level steps, in declaration order
    pub steps: Vec<Step>,
}

impl PipelineDefinition {
    pub fn new(name: &str, steps: Vec<Step>) -> Self {
        Self {
            name: name.to_string(),
            version: DEFINITION_VERSION.to_string(),
            parameters: Vec::new(),
            steps,
        }
    }

    /// Get a top-level step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Names of the top-level steps, in declaration order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Every step, including those nested in condition branches
    pub fn all_steps(&self) -> Vec<&Step> {
        let mut all = Vec::new();
        let mut pending: Vec<&Step> = self.steps.iter().rev().collect();
        while let Some(step) = pending.pop() {
            all.push(step);
            pending.extend(step.branch_steps().into_iter().rev());
        }
        all
    }

    /// Validate names, dependencies and condition references
    pub fn validate(&self) -> Result<()> {
        let all = self.all_steps();

        let mut seen = HashSet::new();
        for step in &all {
            if !seen.insert(step.name.as_str()) {
                anyhow::bail!("Duplicate step name: {}", step.name);
            }
        }

        let top_level: HashSet<&str> = self.step_names().into_iter().collect();
        for step in &self.steps {
            for dep in &step.depends_on {
                if !top_level.contains(dep.as_str()) {
                    anyhow::bail!(
                        "Step '{}' depends on non-existent step '{}'",
                        step.name,
                        dep
                    );
                }
            }
        }

        for step in &all {
            if let StepKind::Condition(args) = &step.kind {
                for condition in &args.conditions {
                    let source = all
                        .iter()
                        .find(|s| s.name == condition.left.step_name)
                        .ok_or_else(|| {
                            anyhow::anyhow!(
                                "Condition in '{}' reads from non-existent step '{}'",
                                step.name,
                                condition.left.step_name
                            )
                        })?;
                    if !source
                        .property_files()
                        .iter()
                        .any(|p| p.name == condition.left.property_file)
                    {
                        anyhow::bail!(
                            "Condition in '{}' reads property file '{}' which step '{}' does not declare",
                            step.name,
                            condition.left.property_file,
                            source.name
                        );
                    }
                }
            }
        }

        self.check_cycles()
    }

    /// Check for cycles in the top-level dependency graph
    fn check_cycles(&self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();

        for step in &self.steps {
            if !visited.contains(&step.name) {
                self.dfs_check(&step.name, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        recursion_stack: &mut HashSet<String>,
    ) -> Result<()> {
        visited.insert(name.to_string());
        recursion_stack.insert(name.to_string());

        if let Some(step) = self.step(name) {
            for dep in &step.depends_on {
                if recursion_stack.contains(dep) {
                    anyhow::bail!("Cycle detected in dependency graph involving step '{}'", dep);
                }
                if !visited.contains(dep) {
                    self.dfs_check(dep, visited, recursion_stack)?;
                }
            }
        }

        recursion_stack.remove(name);
        Ok(())
    }

    /// Topological order of the top-level steps, ties broken by name
    pub fn execution_order(&self) -> Vec<String> {
        let steps: HashMap<&str, &Step> = self.steps.iter().map(|s| (s.name.as_str(), s)).collect();
        let mut result = Vec::new();
        let mut visited = HashSet::new();

        let mut names: Vec<&str> = steps.keys().copied().collect();
        names.sort();

        for name in names {
            Self::visit(name, &steps, &mut visited, &mut result);
        }

        result
    }

    fn visit(
        name: &str,
        steps: &HashMap<&str, &Step>,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }

        if let Some(step) = steps.get(name) {
            let mut deps: Vec<&String> = step.depends_on.iter().collect();
            deps.sort();
            for dep in deps {
                Self::visit(dep, steps, visited, result);
            }
        }

        result.push(name.to_string());
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::condition::{Condition, JsonGet, PropertyFile};
    use crate::core::step::{
        AppSpecification, ClusterConfig, ConditionArgs, ProcessingArgs, ProcessingResources,
    };

    fn processing(property_files: Vec<PropertyFile>) -> StepKind {
        StepKind::Processing(ProcessingArgs {
            processing_resources: ProcessingResources {
                cluster_config: ClusterConfig {
                    instance_type: "ml.m5.xlarge".to_string(),
                    instance_count: 1,
                    volume_size_in_gb: 30,
                },
            },
            app_specification: AppSpecification {
                image_uri: None,
                container_entrypoint: vec![],
                container_arguments: vec![],
            },
            role_arn: None,
            processing_inputs: vec![],
            processing_output_config: None,
            base_job_name: "test".to_string(),
            property_files,
        })
    }

    fn step(name: &str, deps: &[&str]) -> Step {
        let mut step = Step::new(name, processing(vec![]));
        step.depends_on = deps.iter().map(|d| d.to_string()).collect();
        step
    }

    fn gate(reads_from: &str, property_file: &str, inner: Step) -> Step {
        Step::new(
            "gate",
            StepKind::Condition(ConditionArgs {
                conditions: vec![Condition::greater_or_equal(
                    JsonGet {
                        step_name: reads_from.to_string(),
                        property_file: property_file.to_string(),
                        json_path: "Similarity".to_string(),
                    },
                    0.9,
                )],
                if_steps: vec![inner],
                else_steps: vec![],
            }),
        )
    }

    #[test]
    fn test_execution_order() {
        let pipeline = PipelineDefinition::new(
            "p",
            vec![step("c", &["a", "b"]), step("b", &["a"]), step("a", &[])],
        );
        pipeline.validate().unwrap();
        assert_eq!(pipeline.execution_order(), vec!["a", "b", "c"]);
        assert_eq!(pipeline.step_names(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_duplicate_name_fails() {
        let pipeline = PipelineDefinition::new("p", vec![step("a", &[]), step("a", &[])]);
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_duplicate_name_in_branch_fails() {
        let eval = Step::new(
            "eval",
            processing(vec![PropertyFile::new("Report", "evaluation", "e.json")]),
        );
        let pipeline = PipelineDefinition::new(
            "p",
            vec![eval, gate("eval", "Report", step("eval", &[]))],
        );
        let err = pipeline.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate step name"));
    }

    #[test]
    fn test_unknown_dependency_fails() {
        let pipeline = PipelineDefinition::new("p", vec![step("a", &["missing"])]);
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_cycle_fails() {
        let pipeline = PipelineDefinition::new("p", vec![step("a", &["b"]), step("b", &["a"])]);
        let err = pipeline.validate().unwrap_err().to_string();
        assert!(err.contains("Cycle"));
    }

    #[test]
    fn test_condition_must_reference_declared_property_file() {
        let eval = Step::new("eval", processing(vec![]));
        let pipeline =
            PipelineDefinition::new("p", vec![eval, gate("eval", "Report", step("reg", &[]))]);
        let err = pipeline.validate().unwrap_err().to_string();
        assert!(err.contains("does not declare"));

        let pipeline = PipelineDefinition::new("p", vec![gate("nowhere", "Report", step("reg", &[]))]);
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_all_steps_includes_branches() {
        let eval = Step::new(
            "eval",
            processing(vec![PropertyFile::new("Report", "evaluation", "e.json")]),
        );
        let pipeline =
            PipelineDefinition::new("p", vec![eval, gate("eval", "Report", step("reg", &[]))]);
        pipeline.validate().unwrap();

        let names: Vec<&str> = pipeline.all_steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["eval", "gate", "reg"]);
        assert_eq!(pipeline.step_names(), vec!["eval", "gate"]);
    }

    #[test]
    fn test_definition_json_shape() {
        let pipeline = PipelineDefinition::new("p", vec![step("a", &[])]);
        let value: serde_json::Value = serde_json::from_str(&pipeline.to_json().unwrap()).unwrap();
        assert_eq!(value["Version"], DEFINITION_VERSION);
        assert_eq!(value["Parameters"], serde_json::json!([]));
        assert_eq!(value["Steps"][0]["Name"], "a");
        assert!(value.get("Name").is_none());
    }
}
