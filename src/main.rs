mod aws;
mod builder;
mod cli;
mod core;
mod execution;
mod platform;
mod preprocess;
mod storage;

use anyhow::{Context, Result};
use aws::AwsCliConfig;
use cli::commands::{BuildCommand, PlanCommand, PreprocessCommand, SubmitCommand, ValidateCommand};
use cli::output::*;
use cli::{Cli, Command};
use execution::{ExecutionPlan, ReportSet};
use platform::{AwsCliPlatform, Tag};
use storage::{AwsCliStore, LocalStore, ObjectStore};
use tracing::{error, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let result = match &cli.command {
        Command::Build(cmd) => build_pipeline(cmd, &cli).await,
        Command::Submit(cmd) => submit_pipeline(cmd, &cli).await,
        Command::Preprocess(cmd) => run_preprocess(cmd, &cli).await,
        Command::Plan(cmd) => plan_pipeline(cmd, &cli).await,
        Command::Validate(cmd) => validate_config(cmd),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("{} {}", CROSS, style(format!("{:#}", e)).red());
        std::process::exit(1);
    }

    Ok(())
}

fn aws_config(cli: &Cli) -> AwsCliConfig {
    let mut config = AwsCliConfig::new()
        .with_region(cli.region.clone())
        .with_timeout(cli.aws_timeout);
    if let Some(path) = &cli.aws_path {
        config = config.with_executable(path.clone());
    }
    config
}

fn object_store(cli: &Cli) -> Box<dyn ObjectStore> {
    match &cli.store_root {
        Some(root) => Box::new(LocalStore::new(root)),
        None => Box::new(AwsCliStore::new(aws_config(cli))),
    }
}

async fn build_pipeline(cmd: &BuildCommand, cli: &Cli) -> Result<()> {
    let store = object_store(cli);
    let options = cmd.build.to_options(&cli.region);
    let definition = builder::get_pipeline(store.as_ref(), &options).await?;
    for step in definition.all_steps().into_iter().filter(|s| s.missing_image()) {
        warn!("Step {} has no image yet; pass --role or --preprocess-image", step.name);
    }

    let json = if cmd.pretty {
        definition.to_json_pretty()?
    } else {
        definition.to_json()?
    };

    match &cmd.output {
        Some(path) => {
            tokio::fs::write(path, &json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{}", format_definition_summary(&definition));
            eprintln!("{} Definition written to {}", CHECK, style(path.display()).bold());
        }
        None => println!("{}", json),
    }

    Ok(())
}

async fn submit_pipeline(cmd: &SubmitCommand, cli: &Cli) -> Result<()> {
    let store = object_store(cli);
    let platform = AwsCliPlatform::new(aws_config(cli));
    let options = cmd.build.to_options(&cli.region);
    let tags: Vec<Tag> = cmd.tag.iter().map(|(k, v)| Tag::new(k, v)).collect();

    let summary = builder::submit_pipeline(
        store.as_ref(),
        &platform,
        &options,
        tags,
        cmd.project_arn.as_deref(),
    )
    .await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", format_submission(&summary));
    }

    Ok(())
}

async fn run_preprocess(cmd: &PreprocessCommand, cli: &Cli) -> Result<()> {
    let store = object_store(cli);
    let report = preprocess::run(store.as_ref(), &cmd.to_options()).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_preprocess_report(&report));
    }

    Ok(())
}

async fn plan_pipeline(cmd: &PlanCommand, cli: &Cli) -> Result<()> {
    let store = object_store(cli);
    let options = cmd.build.to_options(&cli.region);
    let definition = builder::get_pipeline(store.as_ref(), &options).await?;

    let report = tokio::fs::read(&cmd.report)
        .await
        .with_context(|| format!("Failed to read {}", cmd.report.display()))?;
    let report: serde_json::Value = serde_json::from_slice(&report)
        .with_context(|| format!("{} is not valid JSON", cmd.report.display()))?;

    let reports = ReportSet::new().with(builder::EVAL_STEP, builder::EVALUATION_REPORT, report);
    let plan = ExecutionPlan::resolve(&definition, &reports)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("{}", format_plan(&plan));
    }

    Ok(())
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    let config = core::PipelineConfig::from_file(&cmd.file)
        .with_context(|| format!("Invalid configuration file {}", cmd.file.display()))?;

    println!("{} Configuration is valid!", CHECK);
    println!(
        "  Processing: {} x {}",
        style(config.processing_instance_count).cyan(),
        style(&config.processing_instance_type).cyan()
    );
    println!("  Training: {}", style(&config.training_instance_type).cyan());
    println!("  Approval: {}", style(config.model_approval_status.as_str()).cyan());
    println!("  Input: {}", style(&config.input_data_bucket).dim());
    println!("  Output: {}", style(&config.output_data_bucket).dim());

    if cmd.json {
        println!("\n{}", serde_json::to_string_pretty(&config)?);
    }

    Ok(())
}
