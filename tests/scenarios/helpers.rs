//! Test utility functions for ci-orchestrator scenarios

use async_trait::async_trait;
use ci_orchestrator::core::config::PipelineConfig;
use ci_orchestrator::core::{
    EffectiveEnvironment, JobResult, JobStatus, Pipeline, PipelineResult, StepDescriptor, StepOutcome, StepResult,
    TriggerEvent,
};
use ci_orchestrator::execution::{CancelSignal, PipelineScheduler, StepRunner};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted behaviour for steps whose command line starts with a prefix
#[derive(Debug, Clone)]
pub struct MockStep {
    pub outcome: StepOutcome,
    pub output: String,
    pub delay: Option<Duration>,
}

impl MockStep {
    pub fn fails(output: &str) -> Self {
        Self {
            outcome: StepOutcome::Failed,
            output: output.to_string(),
            delay: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            outcome: StepOutcome::NotFound,
            output: "No such file or directory (os error 2)".to_string(),
            delay: None,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            outcome: StepOutcome::Succeeded,
            output: String::new(),
            delay: Some(delay),
        }
    }
}

/// Shared record of what the mock runner saw
#[derive(Default)]
pub struct MockLog {
    pub calls: Mutex<Vec<(String, EffectiveEnvironment)>>,
    running: AtomicUsize,
    pub peak: AtomicUsize,
    active: Mutex<Vec<String>>,
    overlaps: Mutex<Vec<(String, String)>>,
}

impl MockLog {
    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn env_for(&self, prefix: &str) -> Option<EffectiveEnvironment> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| c.starts_with(prefix))
            .map(|(_, env)| env.clone())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Commands that were running at some point together with `command`
    pub fn overlapping(&self, command: &str) -> Vec<String> {
        self.overlaps
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(a, b)| match (a == command, b == command) {
                (true, _) => Some(b.clone()),
                (_, true) => Some(a.clone()),
                _ => None,
            })
            .collect()
    }

    fn enter(&self, command: &str) {
        let mut active = self.active.lock().unwrap();
        let mut overlaps = self.overlaps.lock().unwrap();
        overlaps.extend(active.iter().map(|other| (other.clone(), command.to_string())));
        active.push(command.to_string());
    }

    fn leave(&self, command: &str) {
        let mut active = self.active.lock().unwrap();
        if let Some(pos) = active.iter().position(|c| c == command) {
            active.remove(pos);
        }
    }
}

/// Step runner that never spawns processes
///
/// Steps succeed unless a scripted prefix matches their command line.
pub struct MockRunner {
    script: Vec<(String, MockStep)>,
    default_delay: Duration,
    log: Arc<MockLog>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            default_delay: Duration::from_millis(10),
            log: Arc::new(MockLog::default()),
        }
    }

    pub fn on(mut self, prefix: &str, step: MockStep) -> Self {
        self.script.push((prefix.to_string(), step));
        self
    }

    pub fn log(&self) -> Arc<MockLog> {
        self.log.clone()
    }
}

#[async_trait]
impl StepRunner for MockRunner {
    async fn run(
        &self,
        step: &StepDescriptor,
        env: &EffectiveEnvironment,
        _workspace: &Path,
        mut cancel: CancelSignal,
    ) -> StepResult {
        let command = step.command_line();
        let scripted = self
            .script
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, s)| s.clone());

        self.log.calls.lock().unwrap().push((command.clone(), env.clone()));
        let now = self.log.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.peak.fetch_max(now, Ordering::SeqCst);
        self.log.enter(&command);

        let delay = scripted.as_ref().and_then(|s| s.delay).unwrap_or(self.default_delay);
        let cancelled = tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = cancel.cancelled() => true,
        };
        self.log.leave(&command);
        self.log.running.fetch_sub(1, Ordering::SeqCst);

        let (outcome, output) = match scripted {
            _ if cancelled => (StepOutcome::Cancelled, String::new()),
            Some(s) => (s.outcome, s.output),
            None => (StepOutcome::Succeeded, format!("{} ok", command)),
        };

        StepResult {
            name: step.name.clone(),
            command,
            outcome,
            exit_code: match outcome {
                StepOutcome::Succeeded => Some(0),
                StepOutcome::Failed => Some(101),
                _ => None,
            },
            stdout: if outcome == StepOutcome::Succeeded { output.clone() } else { String::new() },
            stderr: if outcome == StepOutcome::Succeeded { String::new() } else { output },
            duration_ms: delay.as_millis() as u64,
        }
    }
}

/// The built-in Rust pipeline
pub fn rust_ci_pipeline() -> Pipeline {
    PipelineConfig::rust_ci()
        .unwrap_or_else(|e| panic!("Built-in pipeline is invalid: {}", e))
        .to_pipeline()
}

/// Parse a pipeline from YAML string
pub fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml)
        .unwrap_or_else(|e| panic!("Failed to parse pipeline YAML: {}", e))
        .to_pipeline()
}

/// Run a pipeline for a trigger with a mock runner
pub async fn run_pipeline_with_mock(pipeline: &Pipeline, trigger: TriggerEvent, runner: MockRunner) -> PipelineResult {
    PipelineScheduler::new(runner, ".")
        .execute(pipeline, &trigger, CancelSignal::never())
        .await
}

pub fn job<'a>(result: &'a PipelineResult, name: &str) -> &'a JobResult {
    result
        .job(name)
        .unwrap_or_else(|| panic!("Job '{}' not found in result", name))
}

/// Assert a job finished with the given status
pub fn assert_job_status(result: &PipelineResult, name: &str, status: JobStatus) {
    let job = job(result, name);
    assert_eq!(
        job.status, status,
        "Job '{}' should be {:?}, but was {:?} ({:?})",
        name, status, job.status, job.error
    );
}

/// Assert pipeline succeeded
pub fn assert_pipeline_succeeded(result: &PipelineResult) {
    assert!(
        result.success(),
        "Pipeline should have succeeded, but failed jobs were: {:?}",
        result.failed_jobs().map(|j| &j.name).collect::<Vec<_>>()
    );
}

/// Assert pipeline failed with exactly these jobs failing
pub fn assert_failed_jobs(result: &PipelineResult, expected: &[&str]) {
    let failed: Vec<&str> = result.failed_jobs().map(|j| j.name.as_str()).collect();
    assert!(!result.success(), "Pipeline should have failed");
    assert_eq!(failed, expected, "Expected failed jobs: {:?}\nActual: {:?}", expected, failed);
}
