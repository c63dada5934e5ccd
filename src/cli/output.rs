//! CLI output formatting

use crate::builder::SubmissionSummary;
use crate::core::{PipelineDefinition, Step};
use crate::execution::ExecutionPlan;
use crate::preprocess::PreprocessReport;
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

fn format_step_line(step: &Step) -> String {
    if step.depends_on.is_empty() {
        format!("{} ({})", style(&step.name).cyan(), style(step.type_name()).dim())
    } else {
        format!(
            "{} ({}) ← {}",
            style(&step.name).cyan(),
            style(step.type_name()).dim(),
            step.depends_on.join(", ")
        )
    }
}

/// One line per step, branch steps indented under their condition
pub fn format_definition_summary(definition: &PipelineDefinition) -> String {
    let mut lines = vec![format!(
        "{} {} ({} steps)",
        INFO,
        style(&definition.name).bold(),
        definition.steps.len()
    )];
    for step in &definition.steps {
        lines.push(format!("  {}", format_step_line(step)));
        for inner in step.branch_steps() {
            lines.push(format!("    ↳ {}", format_step_line(inner)));
        }
    }
    lines.join("\n")
}

/// Format a resolved plan for display
pub fn format_plan(plan: &ExecutionPlan) -> String {
    let mut lines = Vec::new();
    for (i, step) in plan.steps.iter().enumerate() {
        let prefix = if step.branch_of.is_some() { "   ↳" } else { "" };
        lines.push(format!(
            "{}{} {}. {} ({})",
            prefix,
            CHECK,
            i + 1,
            style(&step.name).green(),
            style(step.step_type).dim()
        ));
    }
    for outcome in &plan.conditions {
        let verdict = if outcome.satisfied {
            style("satisfied").green().to_string()
        } else {
            style("not satisfied").yellow().to_string()
        };
        lines.push(format!(
            "{} Condition {} {}",
            if outcome.satisfied { INFO } else { SKIP },
            style(&outcome.step_name).bold(),
            verdict
        ));
    }
    lines.join("\n")
}

pub fn format_preprocess_report(report: &PreprocessReport) -> String {
    let mut lines = vec![format!(
        "{} Processed {}/{}: {} rows, {} columns",
        CHECK,
        report.source.bucket,
        report.source.key,
        style(report.rows).cyan(),
        style(report.columns.len()).cyan()
    )];
    for destination in &report.destinations {
        lines.push(format!(
            "  → {}",
            style(format!("{}/{}", destination.bucket, destination.key)).dim()
        ));
    }
    lines.join("\n")
}

pub fn format_submission(summary: &SubmissionSummary) -> String {
    format!(
        "{} {} submitted ({} steps, {} tags)\n  ARN: {}\n  At: {}",
        ROCKET,
        style(&summary.pipeline_name).bold(),
        summary.step_count,
        summary.tags.len(),
        style(&summary.pipeline_arn).cyan(),
        style(summary.submitted_at.to_rfc3339()).dim()
    )
}
