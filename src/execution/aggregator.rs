//! Result aggregation - overall status, exit code and summary

use crate::core::{JobResult, JobStatus, PipelineResult, PipelineStatus, TriggerEvent};
use chrono::{DateTime, Utc};
use console::style;
use std::fmt::Write as _;
use uuid::Uuid;

/// Every job succeeded
pub const EXIT_SUCCESS: i32 = 0;
/// At least one job did not succeed
pub const EXIT_FAILURE: i32 = 1;
/// The run was withdrawn before completing
pub const EXIT_CANCELLED: i32 = 130;

/// Lines of captured output shown for each failed job
const FAILURE_OUTPUT_LINES: usize = 40;

/// Combine completed job results into the pipeline result
///
/// Success is the AND over every job; completion order of `jobs` is kept as
/// given and does not affect the status.
pub fn aggregate(
    run_id: Uuid,
    pipeline_name: impl Into<String>,
    trigger: TriggerEvent,
    jobs: Vec<JobResult>,
    started_at: DateTime<Utc>,
    cancelled: bool,
) -> PipelineResult {
    let status = if cancelled {
        PipelineStatus::Cancelled
    } else if jobs.iter().all(JobResult::success) {
        PipelineStatus::Succeeded
    } else {
        PipelineStatus::Failed
    };

    PipelineResult {
        run_id,
        pipeline_name: pipeline_name.into(),
        trigger,
        jobs,
        status,
        started_at,
        finished_at: Utc::now(),
    }
}

/// Process exit code for a pipeline result
pub fn exit_code(result: &PipelineResult) -> i32 {
    match result.status {
        PipelineStatus::Cancelled => EXIT_CANCELLED,
        _ if result.success() => EXIT_SUCCESS,
        _ => EXIT_FAILURE,
    }
}

fn styled_status(status: JobStatus) -> String {
    let label = format!("{:<9}", status.label());
    match status {
        JobStatus::Succeeded => style(label).green().to_string(),
        JobStatus::Failed | JobStatus::TimedOut => style(label).red().to_string(),
        JobStatus::NotFound => style(label).magenta().to_string(),
        JobStatus::Cancelled => style(label).yellow().to_string(),
    }
}

fn job_detail(job: &JobResult) -> String {
    match job.status {
        JobStatus::Succeeded => format!("{} step(s)", job.steps.len()),
        JobStatus::NotFound => format!(
            "infrastructure: {}",
            job.error.as_ref().map(ToString::to_string).unwrap_or_default()
        ),
        _ => job.error.as_ref().map(ToString::to_string).unwrap_or_default(),
    }
}

/// Keep the last `max_lines` lines of `output`
pub fn tail_lines(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= max_lines {
        return output.to_string();
    }
    format!(
        "... ({} earlier lines)\n{}",
        lines.len() - max_lines,
        lines[lines.len() - max_lines..].join("\n")
    )
}

fn rule_width() -> usize {
    term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(60)
        .clamp(20, 80)
}

/// Render a human-readable summary of a pipeline run
///
/// Lists every job with its terminal status and, for jobs that did not
/// succeed, the failing step's captured output.
pub fn render_summary(result: &PipelineResult) -> String {
    let rule = "─".repeat(rule_width());
    let mut out = String::new();

    let verdict = match result.status {
        PipelineStatus::Succeeded => style("passed").green().bold().to_string(),
        PipelineStatus::Failed => style("failed").red().bold().to_string(),
        PipelineStatus::Cancelled => style("cancelled").yellow().bold().to_string(),
    };

    let _ = writeln!(out, "{}", style(&rule).dim());
    let _ = writeln!(
        out,
        "Pipeline {} [{}] {}: {}/{} jobs passed",
        style(&result.pipeline_name).bold(),
        result.trigger,
        verdict,
        result.passed_count(),
        result.jobs.len()
    );

    let width = result.jobs.iter().map(|j| j.name.len()).max().unwrap_or(0);
    for job in &result.jobs {
        let _ = writeln!(
            out,
            "  {:<width$}  {}  {}",
            job.name,
            styled_status(job.status),
            style(job_detail(job)).dim(),
            width = width
        );
    }

    for job in result.failed_jobs() {
        let Some(step) = job.failing_step() else { continue };
        let output = step.output();
        if output.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}", style(&rule).dim());
        let _ = writeln!(
            out,
            "Output of {} (step '{}'):",
            style(&job.name).bold(),
            step.name
        );
        for line in tail_lines(&output, FAILURE_OUTPUT_LINES).lines() {
            let _ = writeln!(out, "    {}", line);
        }
    }

    let _ = write!(out, "{}", style(&rule).dim());
    out
}
