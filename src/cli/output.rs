//! CLI output formatting

use crate::{
    core::{JobStatus, PipelineStatus, StepOutcome},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over finished jobs
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} jobs {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a pipeline status for display
pub fn format_status(status: PipelineStatus) -> String {
    match status {
        PipelineStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        PipelineStatus::Failed => style("FAILED").red().to_string(),
        PipelineStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a job status for display
pub fn format_job_status(status: JobStatus) -> String {
    let label = status.label().to_uppercase();
    match status {
        JobStatus::Succeeded => style(label).green().to_string(),
        JobStatus::Failed | JobStatus::TimedOut => style(label).red().to_string(),
        JobStatus::NotFound => style(label).magenta().to_string(),
        JobStatus::Cancelled => style(label).yellow().to_string(),
    }
}

/// Format a run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        PipelineStatus::Succeeded => CHECK,
        PipelineStatus::Failed => CROSS,
        PipelineStatus::Cancelled => WARN,
    };

    let mut line = format!(
        "{} {} - {} [{}] - {} ({}/{} jobs) - {}",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        summary.trigger,
        format_status(summary.status),
        summary.passed_jobs(),
        summary.total_jobs,
        style(format_duration(Duration::from_millis(summary.duration_ms()))).cyan()
    );
    if !summary.failed_jobs.is_empty() {
        line.push_str(&format!(" - failed: {}", style(summary.failed_jobs.join(", ")).red()));
    }
    line
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_name,
            trigger,
            jobs,
        } => format!(
            "{} Starting pipeline {} for {} with {} jobs ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(trigger).cyan(),
            jobs,
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::JobStarted { job } => format!("{} {}", SPINNER, style(job).cyan()),
        ExecutionEvent::StepStarted { job, step } => {
            format!("  {} {} {}", style(job).dim(), style("›").dim(), step)
        }
        ExecutionEvent::StepFinished {
            job,
            step,
            outcome,
            exit_code,
        } => {
            let detail = match (outcome, exit_code) {
                (StepOutcome::Succeeded, _) => style("ok").green().to_string(),
                (StepOutcome::Failed, Some(code)) => style(format!("exit {}", code)).red().to_string(),
                (StepOutcome::Failed, None) => style("killed").red().to_string(),
                (StepOutcome::NotFound, _) => style("not found").magenta().to_string(),
                (StepOutcome::TimedOut, _) => style("timed out").red().to_string(),
                (StepOutcome::Cancelled, _) => style("cancelled").yellow().to_string(),
            };
            format!("  {} {} {} {}", style(job).dim(), style("›").dim(), step, detail)
        }
        ExecutionEvent::JobFinished { job, status } => {
            let icon = if *status == JobStatus::Succeeded { CHECK } else { CROSS };
            format!("{} {} {}", icon, style(job).bold(), format_job_status(*status))
        }
        ExecutionEvent::PipelineFinished { run_id, status } => format!(
            "{} Pipeline ({}) {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
