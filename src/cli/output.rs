//! CLI output formatting

use crate::{
    cli::commands::StageListing,
    core::{ExecutionStatus, Idempotency, StageState},
    execution::ExecutionEvent,
    launcher::checks::{CheckReport, Severity},
};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a stage state for display
pub fn format_stage_state(state: &StageState) -> String {
    match state {
        StageState::Pending => style("PENDING").dim().to_string(),
        StageState::Running { .. } => style("RUNNING").yellow().to_string(),
        StageState::Completed { .. } => style("COMPLETED").green().to_string(),
        StageState::Failed { .. } => style("FAILED").red().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format an idempotency contract; unsafe stages stand out
pub fn format_idempotency(idempotency: Idempotency) -> String {
    let label = idempotency.to_string();
    match idempotency {
        Idempotency::NoOp => style(label).dim().to_string(),
        Idempotency::Idempotent => style(label).green().to_string(),
        Idempotency::Overwrite => style(label).yellow().to_string(),
        Idempotency::Unsafe => style(label).red().bold().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            total_stages,
        } => format!(
            "{} Starting pipeline {} with {} stages ({})",
            ROCKET,
            style(pipeline_name).bold(),
            total_stages,
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StageStarted {
            stage_name,
            position,
            total_stages,
            idempotency,
        } => format!(
            "{} [{}/{}] {} ({})",
            SPINNER,
            position,
            total_stages,
            style(stage_name).cyan(),
            format_idempotency(*idempotency)
        ),
        ExecutionEvent::StageCompleted {
            stage_name,
            outcome,
        } => {
            let mut line = format!("{} {}", CHECK, style(stage_name).green());
            for note in &outcome.notes {
                line.push_str(&format!("\n     {}", style(note).dim()));
            }
            line
        }
        ExecutionEvent::StageFailed { stage_name, error } => {
            format!("{} {}: {}", CROSS, style(stage_name).red(), style(error).dim())
        }
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => {
                    format!("{} completed", style("successfully").green())
                }
                other => format_status(*other),
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(&execution_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}

/// One line per stage for `cabinetctl stages`
pub fn format_stage_listing(listing: &StageListing) -> String {
    let marker = if listing.safe_to_rerun { "  " } else { "! " };
    format!(
        "{}{:>2}. {:<20} {:<22} {}",
        marker,
        listing.position,
        listing.name,
        format_idempotency(listing.idempotency),
        style(&listing.description).dim()
    )
}

/// One line per preflight check
pub fn format_check_report(report: &CheckReport) -> String {
    let icon = match (report.passed, report.severity) {
        (true, _) => CHECK,
        (false, Severity::NonFatal) => WARN,
        (false, Severity::Fatal) => CROSS,
    };
    match &report.detail {
        Some(detail) => format!("{} {} {}", icon, style(report.name).bold(), style(detail).dim()),
        None => format!("{} {}", icon, style(report.name).bold()),
    }
}

/// Format stage output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
