//! Job runner - sequences a job's steps

use crate::{
    core::{EffectiveEnvironment, FailurePolicy, JobDescriptor, JobResult, JobStatus, StepError, StepOutcome},
    execution::{CancelSignal, EventEmitter, ExecutionEvent, StepRunner},
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs the steps of one job in declared order
pub struct JobRunner<R> {
    runner: Arc<R>,
    workspace: PathBuf,
    events: EventEmitter,
}

impl<R: StepRunner> JobRunner<R> {
    pub fn new(runner: Arc<R>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            workspace: workspace.into(),
            events: EventEmitter::default(),
        }
    }

    pub(crate) fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Execute a job and return its result
    ///
    /// Never fails: every step problem is recorded in the returned result.
    /// Under `FailFast` the first step that does not succeed stops the job.
    /// Cancellation always stops the job, whatever its policy.
    pub async fn run(&self, job: &JobDescriptor, env: &EffectiveEnvironment, cancel: CancelSignal) -> JobResult {
        let started_at = Utc::now();
        info!("Running job: {} ({} steps)", job.name, job.steps.len());

        let mut steps = Vec::with_capacity(job.steps.len());
        let mut cancelled = false;

        for step in &job.steps {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            self.events.emit(ExecutionEvent::StepStarted {
                job: job.name.clone(),
                step: step.name.clone(),
            });

            let result = self
                .runner
                .run(step, env, &self.workspace, cancel.clone())
                .await;

            debug!("Job {} step {} -> {:?}", job.name, step.name, result.outcome);
            self.events.emit(ExecutionEvent::StepFinished {
                job: job.name.clone(),
                step: step.name.clone(),
                outcome: result.outcome,
                exit_code: result.exit_code,
            });

            let stop = match result.outcome {
                StepOutcome::Succeeded => false,
                StepOutcome::Cancelled => {
                    cancelled = true;
                    true
                }
                _ => job.failure_policy == FailurePolicy::FailFast,
            };
            steps.push(result);

            if stop {
                break;
            }
        }

        let skipped = job.steps.len() - steps.len();
        if skipped > 0 && !cancelled {
            warn!("Job {} aborted, {} step(s) not run", job.name, skipped);
        }

        let mut result = JobResult::from_steps(job.name.clone(), steps, skipped, started_at);

        // Cancelled between steps: nothing failed, but the job did not finish
        if cancelled && result.status == JobStatus::Succeeded {
            result.status = JobStatus::Cancelled;
            result.error = Some(StepError::PipelineCancelled);
        }

        info!("Job {} finished: {}", job.name, result.status.label());
        result
    }
}
