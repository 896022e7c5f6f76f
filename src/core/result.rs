//! Step, job and pipeline results

use crate::core::{error::StepError, trigger::TriggerEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Exited with status 0
    Succeeded,
    /// Ran and reported failure (nonzero exit or killed by a signal)
    Failed,
    /// Could not be located or started
    NotFound,
    /// Killed after exceeding its timeout
    TimedOut,
    /// Killed because the pipeline was cancelled
    Cancelled,
}

/// Result of a completed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,

    /// Command line that was run (after variable expansion)
    pub command: String,

    pub outcome: StepOutcome,

    /// Process exit code, if the process ran and exited normally
    pub exit_code: Option<i32>,

    pub stdout: String,
    pub stderr: String,

    pub duration_ms: u64,
}

impl StepResult {
    pub fn success(&self) -> bool {
        self.outcome == StepOutcome::Succeeded
    }

    /// A stand-in for a step that never ran, used when a job cannot start
    pub fn synthetic(name: impl Into<String>, outcome: StepOutcome, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: String::new(),
            outcome,
            exit_code: None,
            stdout: String::new(),
            stderr: message.into(),
            duration_ms: 0,
        }
    }

    /// Combined captured output, stdout first
    pub fn output(&self) -> String {
        match (self.stdout.trim_end().is_empty(), self.stderr.trim_end().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, _) => self.stderr.trim_end().to_string(),
        }
    }
}

/// Terminal status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    /// A tool reported failure
    Failed,
    /// A tool could not be launched
    NotFound,
    TimedOut,
    Cancelled,
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::NotFound => "not-found",
            JobStatus::TimedOut => "timed-out",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the failure came from the environment rather than the tool
    pub fn is_infrastructure_failure(&self) -> bool {
        matches!(self, JobStatus::NotFound)
    }
}

impl From<StepOutcome> for JobStatus {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Succeeded => JobStatus::Succeeded,
            StepOutcome::Failed => JobStatus::Failed,
            StepOutcome::NotFound => JobStatus::NotFound,
            StepOutcome::TimedOut => JobStatus::TimedOut,
            StepOutcome::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// Result of running one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub name: String,

    pub status: JobStatus,

    /// Recorded steps in execution order
    pub steps: Vec<StepResult>,

    /// Steps never started because an earlier step failed or the run was cancelled
    pub skipped_steps: usize,

    /// Failure reason, None on success
    pub error: Option<StepError>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    /// Build a result from recorded steps
    ///
    /// The status follows the first step that did not succeed.
    pub fn from_steps(
        name: impl Into<String>,
        steps: Vec<StepResult>,
        skipped_steps: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        let first_failure = steps.iter().find(|s| !s.success());
        let status = first_failure
            .map(|s| JobStatus::from(s.outcome))
            .unwrap_or(JobStatus::Succeeded);
        let error = first_failure.map(|s| step_error(s, skipped_steps));

        Self {
            name: name.into(),
            status,
            steps,
            skipped_steps,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// A job that never ran its steps
    pub fn not_started(name: impl Into<String>, outcome: StepOutcome, reason: impl Into<String>, total_steps: usize) -> Self {
        let name = name.into();
        let step = StepResult::synthetic(format!("{} (not started)", name), outcome, reason);
        let now = Utc::now();
        let mut result = Self::from_steps(name, vec![step], total_steps, now);
        result.finished_at = now;
        result
    }

    pub fn success(&self) -> bool {
        self.status == JobStatus::Succeeded && self.steps.iter().all(StepResult::success)
    }

    /// The step that decided the job's status
    pub fn failing_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.success())
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

fn step_error(step: &StepResult, skipped: usize) -> StepError {
    match step.outcome {
        StepOutcome::NotFound => StepError::StepNotFound {
            step: step.name.clone(),
            command: step.command.clone(),
            reason: step.stderr.trim().to_string(),
        },
        StepOutcome::TimedOut => StepError::StepTimedOut {
            step: step.name.clone(),
            secs: step.duration_ms / 1000,
        },
        StepOutcome::Cancelled => StepError::PipelineCancelled,
        StepOutcome::Failed if skipped > 0 => StepError::JobAborted {
            step: step.name.clone(),
            skipped,
        },
        StepOutcome::Failed | StepOutcome::Succeeded => StepError::StepFailed {
            step: step.name.clone(),
            exit_code: step.exit_code,
        },
    }
}

/// Overall status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Succeeded => "succeeded",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for PipelineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(PipelineStatus::Succeeded),
            "failed" => Ok(PipelineStatus::Failed),
            "cancelled" => Ok(PipelineStatus::Cancelled),
            other => Err(format!("Unknown pipeline status: {}", other)),
        }
    }
}

/// Result of one pipeline run, read-only once produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub trigger: TriggerEvent,

    /// One entry per scheduled job, in declared order
    pub jobs: Vec<JobResult>,

    pub status: PipelineStatus,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineResult {
    pub fn success(&self) -> bool {
        self.status == PipelineStatus::Succeeded && self.jobs.iter().all(JobResult::success)
    }

    pub fn job(&self, name: &str) -> Option<&JobResult> {
        self.jobs.iter().find(|j| j.name == name)
    }

    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobResult> {
        self.jobs.iter().filter(|j| !j.success())
    }

    pub fn passed_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.success()).count()
    }
}
