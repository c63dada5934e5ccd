//! Step descriptors

use crate::core::condition::{Condition, PropertyFile};
use crate::core::config::ModelApprovalStatus;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Unique step name
    pub name: String,

    /// What the step runs
    pub kind: StepKind,

    /// Names of the steps that must finish first
    pub depends_on: Vec<String>,
}

/// The kinds of managed job a step can describe
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// Data preparation job
    Processing(ProcessingArgs),
    /// Model training job
    Training(TrainingArgs),
    /// Processing job that scores the trained model and writes a property file
    Evaluation(ProcessingArgs),
    /// Gate that runs one of two step lists
    Condition(ConditionArgs),
    /// Model package registration (only inside a condition branch)
    RegisterModel(RegisterModelArgs),
}

/// Location of job data: a literal URI, or a property of an earlier step
/// that the engine resolves at run time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataUri {
    Literal(String),
    StepProperty(String),
}

impl Serialize for DataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataUri::Literal(uri) => serializer.serialize_str(uri),
            DataUri::StepProperty(path) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Get", path)?;
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterConfig {
    pub instance_type: String,
    pub instance_count: u32,
    #[serde(rename = "VolumeSizeInGB")]
    pub volume_size_in_gb: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingResources {
    pub cluster_config: ClusterConfig,
}

/// Container a processing job runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppSpecification {
    /// Unset until the image can be resolved (see `Step::missing_image`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    pub container_entrypoint: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub container_arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Input {
    pub s3_uri: DataUri,
    pub local_path: String,
    pub s3_data_type: String,
    pub s3_input_mode: String,
    pub s3_data_distribution_type: String,
    pub s3_compression_type: String,
}

/// Data staged into the container before a processing job starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingInput {
    pub input_name: String,
    pub app_managed: bool,
    pub s3_input: S3Input,
}

impl ProcessingInput {
    /// Copy everything under `uri` to `local_path`
    pub fn s3(name: &str, uri: DataUri, local_path: &str) -> Self {
        Self {
            input_name: name.to_string(),
            app_managed: false,
            s3_input: S3Input {
                s3_uri: uri,
                local_path: local_path.to_string(),
                s3_data_type: "S3Prefix".to_string(),
                s3_input_mode: "File".to_string(),
                s3_data_distribution_type: "FullyReplicated".to_string(),
                s3_compression_type: "None".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Output {
    pub s3_uri: String,
    pub local_path: String,
    pub s3_upload_mode: String,
}

/// Named directory a processing job publishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingOutput {
    pub output_name: String,
    pub app_managed: bool,
    pub s3_output: S3Output,
}

impl ProcessingOutput {
    /// Upload `local_path` to `uri` when the job ends
    pub fn s3(name: &str, local_path: &str, uri: String) -> Self {
        Self {
            output_name: name.to_string(),
            app_managed: false,
            s3_output: S3Output {
                s3_uri: uri,
                local_path: local_path.to_string(),
                s3_upload_mode: "EndOfJob".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingOutputConfig {
    pub outputs: Vec<ProcessingOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessingArgs {
    pub processing_resources: ProcessingResources,
    pub app_specification: AppSpecification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub processing_inputs: Vec<ProcessingInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_output_config: Option<ProcessingOutputConfig>,
    /// Job name prefix; inside a pipeline the engine names the job itself
    #[serde(skip)]
    pub base_job_name: String,
    /// Emitted at step level rather than inside the arguments
    #[serde(skip)]
    pub property_files: Vec<PropertyFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlgorithmSpecification {
    pub training_image: String,
    pub training_input_mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3DataSource {
    pub s3_data_type: String,
    pub s3_uri: DataUri,
    pub s3_data_distribution_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataSource {
    pub s3_data_source: S3DataSource,
}

/// Named training input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Channel {
    pub channel_name: String,
    pub data_source: DataSource,
    pub content_type: String,
}

impl Channel {
    pub fn csv(name: &str, uri: DataUri) -> Self {
        Self {
            channel_name: name.to_string(),
            data_source: DataSource {
                s3_data_source: S3DataSource {
                    s3_data_type: "S3Prefix".to_string(),
                    s3_uri: uri,
                    s3_data_distribution_type: "FullyReplicated".to_string(),
                },
            },
            content_type: "text/csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputDataConfig {
    pub s3_output_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceConfig {
    pub instance_type: String,
    pub instance_count: u32,
    #[serde(rename = "VolumeSizeInGB")]
    pub volume_size_in_gb: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoppingCondition {
    pub max_runtime_in_seconds: u64,
}

/// Managed training job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainingArgs {
    pub algorithm_specification: AlgorithmSpecification,
    /// Values are JSON-encoded, as the framework containers expect
    pub hyper_parameters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input_data_config: Vec<Channel>,
    pub output_data_config: OutputDataConfig,
    pub resource_config: ResourceConfig,
    pub stopping_condition: StoppingCondition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConditionArgs {
    pub conditions: Vec<Condition>,
    pub if_steps: Vec<Step>,
    pub else_steps: Vec<Step>,
}

/// Serving container of a registered model package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelContainer {
    pub image: String,
    pub environment: BTreeMap<String, String>,
    pub model_data_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InferenceSpecification {
    pub containers: Vec<ModelContainer>,
    pub supported_content_types: Vec<String>,
    #[serde(rename = "SupportedResponseMIMETypes")]
    pub supported_response_mime_types: Vec<String>,
    pub supported_realtime_inference_instance_types: Vec<String>,
    pub supported_transform_instance_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterModelArgs {
    pub model_package_group_name: String,
    pub inference_specification: InferenceSpecification,
    #[serde(serialize_with = "serialize_approval")]
    pub model_approval_status: ModelApprovalStatus,
}

fn serialize_approval<S: Serializer>(
    status: &ModelApprovalStatus,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(status.as_str())
}

impl Step {
    pub fn new(name: &str, kind: StepKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            depends_on: Vec::new(),
        }
    }

    /// Declare predecessors
    pub fn depends_on(mut self, steps: &[&Step]) -> Self {
        self.depends_on
            .extend(steps.iter().map(|s| s.name.clone()));
        self
    }

    /// Type tag used in the pipeline definition
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            StepKind::Processing(_) | StepKind::Evaluation(_) => "Processing",
            StepKind::Training(_) => "Training",
            StepKind::Condition(_) => "Condition",
            StepKind::RegisterModel(_) => "RegisterModel",
        }
    }

    /// Property files this step writes
    pub fn property_files(&self) -> &[PropertyFile] {
        match &self.kind {
            StepKind::Processing(args) | StepKind::Evaluation(args) => &args.property_files,
            _ => &[],
        }
    }

    /// A processing job whose container image is not known yet
    pub fn missing_image(&self) -> bool {
        match &self.kind {
            StepKind::Processing(args) | StepKind::Evaluation(args) => {
                args.app_specification.image_uri.is_none()
            }
            _ => false,
        }
    }

    /// Steps held in this step's branches
    pub fn branch_steps(&self) -> Vec<&Step> {
        match &self.kind {
            StepKind::Condition(args) => args.if_steps.iter().chain(&args.else_steps).collect(),
            _ => Vec::new(),
        }
    }

    /// Check if all dependencies are satisfied
    pub fn dependencies_met(&self, finished: &std::collections::HashSet<String>) -> bool {
        self.depends_on.iter().all(|dep| finished.contains(dep))
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("Name", &self.name)?;
        map.serialize_entry("Type", self.type_name())?;
        if !self.depends_on.is_empty() {
            map.serialize_entry("DependsOn", &self.depends_on)?;
        }
        match &self.kind {
            StepKind::Processing(args) | StepKind::Evaluation(args) => {
                map.serialize_entry("Arguments", args)?
            }
            StepKind::Training(args) => map.serialize_entry("Arguments", args)?,
            StepKind::Condition(args) => map.serialize_entry("Arguments", args)?,
            StepKind::RegisterModel(args) => map.serialize_entry("Arguments", args)?,
        }
        let property_files = self.property_files();
        if !property_files.is_empty() {
            map.serialize_entry("PropertyFiles", property_files)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn processing() -> ProcessingArgs {
        ProcessingArgs {
            processing_resources: ProcessingResources {
                cluster_config: ClusterConfig {
                    instance_type: "ml.m5.xlarge".to_string(),
                    instance_count: 1,
                    volume_size_in_gb: 30,
                },
            },
            app_specification: AppSpecification {
                image_uri: Some("sklearn:0.23-1-cpu-py3".to_string()),
                container_entrypoint: vec!["python3".to_string()],
                container_arguments: vec![],
            },
            role_arn: None,
            processing_inputs: vec![ProcessingInput::s3(
                "model",
                DataUri::StepProperty("Steps.TrainModel.ModelArtifacts.S3ModelArtifacts".to_string()),
                "/opt/ml/processing/model",
            )],
            processing_output_config: Some(ProcessingOutputConfig {
                outputs: vec![ProcessingOutput::s3(
                    "evaluation",
                    "/opt/ml/processing/evaluation",
                    "s3://b/evaluation".to_string(),
                )],
            }),
            base_job_name: "Abalone/eval".to_string(),
            property_files: vec![PropertyFile::new(
                "EvaluationReport",
                "evaluation",
                "evaluation.json",
            )],
        }
    }

    #[test]
    fn test_dependencies_met() {
        let first = Step::new("first", StepKind::Processing(processing()));
        let second = Step::new("second", StepKind::Processing(processing())).depends_on(&[&first]);

        let mut finished = HashSet::new();
        assert!(first.dependencies_met(&finished));
        assert!(!second.dependencies_met(&finished));

        finished.insert("first".to_string());
        assert!(second.dependencies_met(&finished));
    }

    #[test]
    fn test_evaluation_serializes_as_processing() {
        let first = Step::new("TrainModel", StepKind::Processing(processing()));
        let step = Step::new("Eval", StepKind::Evaluation(processing())).depends_on(&[&first]);
        let value = serde_json::to_value(&step).unwrap();

        assert_eq!(value["Name"], "Eval");
        assert_eq!(value["Type"], "Processing");
        assert_eq!(value["DependsOn"], json!(["TrainModel"]));
        let args = &value["Arguments"];
        assert_eq!(
            args["ProcessingResources"]["ClusterConfig"],
            json!({"InstanceType": "ml.m5.xlarge", "InstanceCount": 1, "VolumeSizeInGB": 30})
        );
        assert_eq!(args["AppSpecification"]["ImageUri"], "sklearn:0.23-1-cpu-py3");
        assert!(args["AppSpecification"].get("ContainerArguments").is_none());
        assert!(args.get("RoleArn").is_none());
        assert_eq!(
            args["ProcessingInputs"][0]["S3Input"]["S3Uri"],
            json!({"Get": "Steps.TrainModel.ModelArtifacts.S3ModelArtifacts"})
        );
        assert_eq!(
            args["ProcessingOutputConfig"]["Outputs"][0]["S3Output"]["S3UploadMode"],
            "EndOfJob"
        );
        assert!(args.get("BaseJobName").is_none());
        assert!(value["Arguments"].get("PropertyFiles").is_none());
        assert_eq!(
            value["PropertyFiles"],
            json!([{
                "PropertyFileName": "EvaluationReport",
                "OutputName": "evaluation",
                "FilePath": "evaluation.json"
            }])
        );
    }

    #[test]
    fn test_literal_data_uri_is_a_string() {
        let channel = Channel::csv("train", DataUri::Literal("s3://b/data/processed.csv".to_string()));
        let value = serde_json::to_value(&channel).unwrap();
        assert_eq!(
            value["DataSource"]["S3DataSource"]["S3Uri"],
            "s3://b/data/processed.csv"
        );
        assert_eq!(value["ContentType"], "text/csv");
    }

    #[test]
    fn test_missing_image() {
        let mut args = processing();
        let ready = Step::new("ready", StepKind::Processing(args.clone()));
        assert!(!ready.missing_image());

        args.app_specification.image_uri = None;
        let pending = Step::new("pending", StepKind::Processing(args));
        assert!(pending.missing_image());
    }

    #[test]
    fn test_no_depends_on_key_without_predecessors() {
        let step = Step::new("DataProcessing", StepKind::Processing(processing()));
        let value = serde_json::to_value(&step).unwrap();
        assert!(value.get("DependsOn").is_none());
    }

    #[test]
    fn test_branch_steps() {
        let register = Step::new("inner", StepKind::Processing(processing()));
        let gate = Step::new(
            "gate",
            StepKind::Condition(ConditionArgs {
                conditions: vec![],
                if_steps: vec![register],
                else_steps: vec![],
            }),
        );
        let names: Vec<&str> = gate.branch_steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["inner"]);
        assert_eq!(gate.type_name(), "Condition");
    }
}
