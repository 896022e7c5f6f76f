//! Pipeline scheduler - dispatches a trigger's jobs and collects their results

use crate::{
    core::{JobDescriptor, JobResult, JobStatus, Pipeline, PipelineResult, PipelineStatus, StepOutcome, TriggerEvent},
    execution::{aggregator, CancelSignal, JobRunner, StepRunner},
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tracing::{error, info};
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline_name: String,
        trigger: TriggerEvent,
        jobs: usize,
    },
    JobStarted {
        job: String,
    },
    StepStarted {
        job: String,
        step: String,
    },
    StepFinished {
        job: String,
        step: String,
        outcome: StepOutcome,
        exit_code: Option<i32>,
    },
    JobFinished {
        job: String,
        status: JobStatus,
    },
    PipelineFinished {
        run_id: Uuid,
        status: PipelineStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fans events out to registered handlers
#[derive(Clone, Default)]
pub struct EventEmitter {
    handlers: Arc<Vec<EventHandler>>,
}

impl EventEmitter {
    pub fn new(handlers: Vec<EventHandler>) -> Self {
        Self {
            handlers: Arc::new(handlers),
        }
    }

    pub fn emit(&self, event: ExecutionEvent) {
        for handler in self.handlers.iter() {
            handler(event.clone());
        }
    }
}

/// Runs every job a trigger selects
///
/// Jobs are independent: they run concurrently, up to the in-flight limit,
/// and one job's failure never stops another. The workspace is shared by
/// all jobs and access to it is not serialized; jobs are expected not to
/// write to it concurrently.
pub struct PipelineScheduler<R> {
    runner: Arc<R>,
    workspace: PathBuf,
    max_parallel: Option<usize>,
    handlers: Vec<EventHandler>,
}

impl<R: StepRunner + 'static> PipelineScheduler<R> {
    pub fn new(runner: R, workspace: impl Into<PathBuf>) -> Self {
        Self {
            runner: Arc::new(runner),
            workspace: workspace.into(),
            max_parallel: None,
            handlers: Vec::new(),
        }
    }

    /// Override the pipeline's in-flight job limit
    pub fn with_max_parallel(mut self, max_parallel: Option<usize>) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    /// Run the jobs `pipeline` schedules for `trigger`
    ///
    /// Waits for every job to reach a terminal result. The returned result
    /// holds exactly one entry per scheduled job, in declared order.
    pub async fn execute(&self, pipeline: &Pipeline, trigger: &TriggerEvent, cancel: CancelSignal) -> PipelineResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let jobs: Vec<JobDescriptor> = pipeline.jobs_for(trigger).into_iter().cloned().collect();
        let events = EventEmitter::new(self.handlers.clone());

        info!(
            "Starting pipeline {} for {} ({} jobs, run {})",
            pipeline.name,
            trigger,
            jobs.len(),
            run_id
        );
        events.emit(ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_name: pipeline.name.clone(),
            trigger: trigger.clone(),
            jobs: jobs.len(),
        });

        let resolver = pipeline.resolver();
        let limit = self.max_parallel.or(pipeline.max_parallel);
        let semaphore = limit.map(|n| Arc::new(Semaphore::new(n.max(1))));
        let exclusive = Arc::new(RwLock::new(()));
        let job_runner = Arc::new(
            JobRunner::new(self.runner.clone(), self.workspace.clone()).with_events(events.clone()),
        );

        let mut handles = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let job = job.clone();
            let env = resolver.resolve(&job);
            let semaphore = semaphore.clone();
            let exclusive = exclusive.clone();
            let job_runner = job_runner.clone();
            let events = events.clone();
            let mut cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                // Permit before lock: an exclusive job waits for a free slot first
                let admission = async {
                    let permit = match semaphore {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    let (shared, sole) = if job.parallel {
                        (Some(exclusive.read_owned().await), None)
                    } else {
                        (None, Some(exclusive.write_owned().await))
                    };
                    (permit, shared, sole)
                };

                let _admitted = tokio::select! {
                    admitted = admission => admitted,
                    _ = cancel.cancelled() => return cancelled_before_start(&job),
                };
                if cancel.is_cancelled() {
                    return cancelled_before_start(&job);
                }

                if let Err(reason) = preflight(&job, job_runner.workspace()) {
                    error!("Job {} cannot start: {}", job.name, reason);
                    let result = JobResult::not_started(job.name.clone(), StepOutcome::NotFound, reason, job.steps.len());
                    events.emit(ExecutionEvent::JobFinished {
                        job: job.name.clone(),
                        status: result.status,
                    });
                    return result;
                }

                events.emit(ExecutionEvent::JobStarted { job: job.name.clone() });
                let result = job_runner.run(&job, &env, cancel).await;
                events.emit(ExecutionEvent::JobFinished {
                    job: job.name.clone(),
                    status: result.status,
                });
                result
            }));
        }

        let mut results = Vec::with_capacity(jobs.len());
        for (job, handle) in jobs.iter().zip(handles) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!("Job {} task failed: {}", job.name, e);
                    results.push(JobResult::not_started(
                        job.name.clone(),
                        StepOutcome::Failed,
                        format!("job task failed: {}", e),
                        job.steps.len(),
                    ));
                }
            }
        }

        // A cancel that lands after the last job finished changes nothing
        let cancelled = results.iter().any(|j| j.status == JobStatus::Cancelled);
        let result = aggregator::aggregate(run_id, pipeline.name.clone(), trigger.clone(), results, started_at, cancelled);

        info!(
            "Pipeline {} finished: {} ({}/{} jobs passed)",
            pipeline.name,
            result.status.as_str(),
            result.passed_count(),
            result.jobs.len()
        );
        events.emit(ExecutionEvent::PipelineFinished {
            run_id,
            status: result.status,
        });

        result
    }
}

fn cancelled_before_start(job: &JobDescriptor) -> JobResult {
    info!("Job {} cancelled before it started", job.name);
    JobResult::not_started(job.name.clone(), StepOutcome::Cancelled, "pipeline cancelled before job started", job.steps.len())
}

/// Check what must hold before a job's first step can run
fn preflight(job: &JobDescriptor, workspace: &Path) -> Result<(), String> {
    for step in &job.steps {
        if let Some(dir) = &step.working_directory {
            let path = workspace.join(dir);
            if !path.is_dir() {
                return Err(format!(
                    "working directory {} for step '{}' does not exist",
                    path.display(),
                    step.name
                ));
            }
        }
    }
    Ok(())
}
