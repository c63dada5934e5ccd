//! Pipeline Definition Builder
//!
//! Reads the configuration object and assembles the preprocess → train →
//! evaluate → gated-registration step graph.

pub mod images;
pub mod submit;
pub mod tags;

pub use submit::{submit_pipeline, SubmissionSummary};
pub use tags::pipeline_custom_tags;

use crate::core::condition::{Condition, JsonGet, PropertyFile};
use crate::core::config::{ConfigSource, PipelineConfig};
use crate::core::pipeline::PipelineDefinition;
use crate::core::step::{
    AlgorithmSpecification, AppSpecification, Channel, ClusterConfig, ConditionArgs, DataUri,
    InferenceSpecification, ModelContainer, OutputDataConfig, ProcessingArgs, ProcessingInput,
    ProcessingOutput, ProcessingOutputConfig, ProcessingResources, RegisterModelArgs,
    ResourceConfig, Step, StepKind, StoppingCondition, TrainingArgs,
};
use crate::preprocess::PROCESSED_KEY;
use crate::storage::ObjectStore;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const FRAMEWORK: &str = "sklearn";
pub const FRAMEWORK_VERSION: &str = "0.23-1";

pub const PROCESS_STEP: &str = "DataProcessing";
pub const TRAIN_STEP: &str = "TrainModel";
pub const EVAL_STEP: &str = "Eval";
pub const CONDITION_STEP: &str = "SimilarityEvalCondition";
pub const REGISTER_STEP: &str = "RegisterModel";

pub const EVALUATION_REPORT: &str = "EvaluationReport";
pub const EVALUATION_OUTPUT: &str = "evaluation";
pub const EVALUATION_REPORT_PATH: &str = "evaluation_kids.json";
pub const SIMILARITY_FIELD: &str = "Similarity";
pub const SIMILARITY_THRESHOLD: f64 = 0.9;

/// Training code package, under the artifact bucket
pub const TRAINER_PACKAGE_KEY: &str = "model/model_trainer.tar.gz";
/// Evaluation script, under the artifact bucket
pub const EVALUATION_SCRIPT_KEY: &str = "code/evaluate.py";
/// Model registered by the pipeline, under the artifact bucket
pub const MODEL_ARTIFACT_KEY: &str = "model_artifact/model.tar.gz";

const VOLUME_SIZE_GB: u32 = 30;
const MAX_TRAINING_SECONDS: u64 = 24 * 60 * 60;
const CONTAINER_LOG_LEVEL: &str = "20";

/// Caller-supplied build settings
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Region the pipeline is created and run in
    pub region: String,

    /// Execution role; left unset in the definition when absent
    pub role: Option<String>,

    /// Bucket for training output (defaults to the artifact bucket)
    pub default_bucket: Option<String>,

    pub model_package_group_name: String,
    pub pipeline_name: String,
    pub base_job_prefix: String,

    /// Location of the configuration object
    pub config_source: ConfigSource,

    /// Image for training, evaluation and serving; looked up by region when unset
    pub framework_image: Option<String>,

    /// Image running `mlpipeline preprocess`; derived from the role's account when unset
    pub preprocess_image: Option<String>,
}

impl BuildOptions {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            role: None,
            default_bucket: None,
            model_package_group_name: "AbalonePackageGroup".to_string(),
            pipeline_name: "AbalonePipeline".to_string(),
            base_job_prefix: "Abalone".to_string(),
            config_source: ConfigSource::default(),
            framework_image: None,
            preprocess_image: None,
        }
    }

    pub fn with_role(mut self, role: String) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_default_bucket(mut self, bucket: String) -> Self {
        self.default_bucket = Some(bucket);
        self
    }

    pub fn with_pipeline_name(mut self, name: String) -> Self {
        self.pipeline_name = name;
        self
    }

    pub fn with_config_source(mut self, source: ConfigSource) -> Self {
        self.config_source = source;
        self
    }

    pub fn with_framework_image(mut self, image: String) -> Self {
        self.framework_image = Some(image);
        self
    }

    pub fn with_preprocess_image(mut self, image: String) -> Self {
        self.preprocess_image = Some(image);
        self
    }
}

/// Builds the pipeline definition from a loaded configuration
pub struct PipelineBuilder<'a> {
    options: &'a BuildOptions,
    config: &'a PipelineConfig,
    framework_image: String,
    preprocess_image: Option<String>,
}

impl<'a> PipelineBuilder<'a> {
    /// Resolve container images; fails when the region has no known framework image
    pub fn new(options: &'a BuildOptions, config: &'a PipelineConfig) -> Result<Self> {
        let framework_image = match &options.framework_image {
            Some(image) => image.clone(),
            None => images::framework_image_uri(&options.region, FRAMEWORK_VERSION).ok_or_else(
                || {
                    anyhow::anyhow!(
                        "No {} {} image is known for region {}; pass --framework-image",
                        FRAMEWORK,
                        FRAMEWORK_VERSION,
                        options.region
                    )
                },
            )?,
        };

        let preprocess_image = options.preprocess_image.clone().or_else(|| {
            options
                .role
                .as_deref()
                .and_then(|role| images::preprocess_image_uri(role, &options.region))
        });
        if preprocess_image.is_none() {
            debug!("Preprocessing image left unset until an execution role is known");
        }

        Ok(Self {
            options,
            config,
            framework_image,
            preprocess_image,
        })
    }

    fn artifact_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.config.artifact_bucket(), key)
    }

    fn output_uri(&self, suffix: &str) -> String {
        let bucket = self
            .options
            .default_bucket
            .as_deref()
            .unwrap_or_else(|| self.config.artifact_bucket());
        format!("s3://{}/{}/{}", bucket, self.options.pipeline_name, suffix)
    }

    fn processing_resources(&self) -> ProcessingResources {
        ProcessingResources {
            cluster_config: ClusterConfig {
                instance_type: self.config.processing_instance_type.clone(),
                instance_count: self.config.processing_instance_count,
                volume_size_in_gb: VOLUME_SIZE_GB,
            },
        }
    }

    fn base_job_name(&self, job: &str) -> String {
        format!("{}/{}", self.options.base_job_prefix, job)
    }

    /// Framework containers read their settings from the environment
    fn framework_environment(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("SAGEMAKER_PROGRAM".to_string(), "inference.py".to_string()),
            (
                "SAGEMAKER_SUBMIT_DIRECTORY".to_string(),
                self.artifact_uri(TRAINER_PACKAGE_KEY),
            ),
            (
                "SAGEMAKER_CONTAINER_LOG_LEVEL".to_string(),
                CONTAINER_LOG_LEVEL.to_string(),
            ),
            ("SAGEMAKER_REGION".to_string(), self.options.region.clone()),
        ])
    }

    /// Feature engineering job; runs this crate's `preprocess` command
    pub fn process_step(&self) -> Step {
        Step::new(
            PROCESS_STEP,
            StepKind::Processing(ProcessingArgs {
                processing_resources: self.processing_resources(),
                app_specification: AppSpecification {
                    image_uri: self.preprocess_image.clone(),
                    container_entrypoint: vec!["mlpipeline".to_string(), "preprocess".to_string()],
                    container_arguments: vec![
                        "--input-data".to_string(),
                        self.config.input_data_bucket.to_string(),
                        "--output-data".to_string(),
                        self.config.output_data_bucket.to_string(),
                        "--artifact-bucket".to_string(),
                        self.config.artifact_bucket().to_string(),
                        "--region".to_string(),
                        self.options.region.clone(),
                    ],
                },
                role_arn: self.options.role.clone(),
                processing_inputs: Vec::new(),
                processing_output_config: None,
                base_job_name: self.base_job_name("sklearn-abalone-preprocess"),
                property_files: Vec::new(),
            }),
        )
    }

    pub fn train_step(&self) -> Step {
        // Framework containers expect JSON-encoded hyperparameter values
        let encoded = |s: &str| Value::String(s.to_string()).to_string();
        let hyper_parameters = BTreeMap::from([
            ("sagemaker_program".to_string(), encoded("inference.py")),
            (
                "sagemaker_submit_directory".to_string(),
                encoded(&self.artifact_uri(TRAINER_PACKAGE_KEY)),
            ),
            (
                "sagemaker_container_log_level".to_string(),
                CONTAINER_LOG_LEVEL.to_string(),
            ),
            ("sagemaker_region".to_string(), encoded(&self.options.region)),
        ]);

        Step::new(
            TRAIN_STEP,
            StepKind::Training(TrainingArgs {
                algorithm_specification: AlgorithmSpecification {
                    training_image: self.framework_image.clone(),
                    training_input_mode: "File".to_string(),
                },
                hyper_parameters,
                input_data_config: vec![Channel::csv(
                    "train",
                    DataUri::Literal(self.artifact_uri(PROCESSED_KEY)),
                )],
                output_data_config: OutputDataConfig {
                    s3_output_path: self.output_uri("training"),
                },
                resource_config: ResourceConfig {
                    instance_type: self.config.training_instance_type.clone(),
                    instance_count: 1,
                    volume_size_in_gb: VOLUME_SIZE_GB,
                },
                stopping_condition: StoppingCondition {
                    max_runtime_in_seconds: MAX_TRAINING_SECONDS,
                },
                role_arn: self.options.role.clone(),
            }),
        )
    }

    pub fn evaluation_report() -> PropertyFile {
        PropertyFile::new(EVALUATION_REPORT, EVALUATION_OUTPUT, EVALUATION_REPORT_PATH)
    }

    /// Scores the trained model; stages the model, the processed data and the script
    pub fn eval_step(&self) -> Step {
        Step::new(
            EVAL_STEP,
            StepKind::Evaluation(ProcessingArgs {
                processing_resources: self.processing_resources(),
                app_specification: AppSpecification {
                    image_uri: Some(self.framework_image.clone()),
                    container_entrypoint: vec![
                        "python3".to_string(),
                        "/opt/ml/processing/input/code/evaluate.py".to_string(),
                    ],
                    container_arguments: Vec::new(),
                },
                role_arn: self.options.role.clone(),
                processing_inputs: vec![
                    ProcessingInput::s3(
                        "model",
                        DataUri::StepProperty(format!(
                            "Steps.{}.ModelArtifacts.S3ModelArtifacts",
                            TRAIN_STEP
                        )),
                        "/opt/ml/processing/model",
                    ),
                    ProcessingInput::s3(
                        "test",
                        DataUri::Literal(self.artifact_uri(PROCESSED_KEY)),
                        "/opt/ml/processing/test",
                    ),
                    ProcessingInput::s3(
                        "code",
                        DataUri::Literal(self.artifact_uri(EVALUATION_SCRIPT_KEY)),
                        "/opt/ml/processing/input/code",
                    ),
                ],
                processing_output_config: Some(ProcessingOutputConfig {
                    outputs: vec![ProcessingOutput::s3(
                        EVALUATION_OUTPUT,
                        "/opt/ml/processing/evaluation",
                        self.output_uri(EVALUATION_OUTPUT),
                    )],
                }),
                base_job_name: self.base_job_name("sklearn-abalone-eval"),
                property_files: vec![Self::evaluation_report()],
            }),
        )
    }

    pub fn register_step(&self) -> Step {
        let json = vec!["application/json".to_string()];
        Step::new(
            REGISTER_STEP,
            StepKind::RegisterModel(RegisterModelArgs {
                model_package_group_name: self.options.model_package_group_name.clone(),
                inference_specification: InferenceSpecification {
                    containers: vec![ModelContainer {
                        image: self.framework_image.clone(),
                        environment: self.framework_environment(),
                        model_data_url: self.artifact_uri(MODEL_ARTIFACT_KEY),
                    }],
                    supported_content_types: json.clone(),
                    supported_response_mime_types: json,
                    supported_realtime_inference_instance_types: vec!["ml.t2.large".to_string()],
                    supported_transform_instance_types: vec!["ml.m4.xlarge".to_string()],
                },
                model_approval_status: self.config.model_approval_status,
            }),
        )
    }

    /// `Similarity >= 0.9` read from the evaluation step's report
    pub fn similarity_condition() -> Condition {
        Condition::greater_or_equal(
            JsonGet {
                step_name: EVAL_STEP.to_string(),
                property_file: EVALUATION_REPORT.to_string(),
                json_path: SIMILARITY_FIELD.to_string(),
            },
            SIMILARITY_THRESHOLD,
        )
    }

    pub fn condition_step(&self, register: Step) -> Step {
        Step::new(
            CONDITION_STEP,
            StepKind::Condition(ConditionArgs {
                conditions: vec![Self::similarity_condition()],
                if_steps: vec![register],
                else_steps: Vec::new(),
            }),
        )
    }

    /// Assemble and validate the full step graph
    pub fn build(&self) -> Result<PipelineDefinition> {
        let process = self.process_step();
        let train = self.train_step().depends_on(&[&process]);
        let eval = self.eval_step().depends_on(&[&train]);
        let condition = self.condition_step(self.register_step()).depends_on(&[&eval]);

        let definition = PipelineDefinition::new(
            &self.options.pipeline_name,
            vec![process, train, eval, condition],
        );
        definition
            .validate()
            .context("Built pipeline definition is invalid")?;

        debug!("Execution order: {:?}", definition.execution_order());
        Ok(definition)
    }
}

/// Read the configuration object and build the pipeline definition
pub async fn get_pipeline(
    store: &dyn ObjectStore,
    options: &BuildOptions,
) -> Result<PipelineDefinition> {
    let config = PipelineConfig::load(store, &options.config_source).await?;

    info!(
        "Building pipeline {} in {} ({} x {})",
        options.pipeline_name,
        options.region,
        config.processing_instance_count,
        config.processing_instance_type
    );

    PipelineBuilder::new(options, &config)?.build()
}
