//! Test: withdrawing a run part-way through

use crate::helpers::*;
use ci_orchestrator::core::{JobStatus, PipelineStatus, TriggerEvent};
use ci_orchestrator::execution::{exit_code, CancellationHandle, PipelineScheduler, EXIT_CANCELLED};
use std::time::Duration;

const YAML: &str = r#"
name: cancel-me
jobs:
  - name: quick
    steps:
      - run: quick
  - name: slow
    steps:
      - run: slow
      - run: after-slow
  - name: queued
    parallel: false
    steps:
      - run: queued
"#;

/// Finished jobs keep their results; running and queued jobs are cancelled
#[tokio::test]
async fn test_cancel_mid_run() {
    let pipeline = pipeline_from_yaml(YAML);
    let runner = MockRunner::new().on("slow", MockStep::slow(Duration::from_secs(30)));
    let log = runner.log();
    let scheduler = PipelineScheduler::new(runner, ".");

    let handle = CancellationHandle::new();
    let signal = handle.signal();
    let trigger = TriggerEvent::push();
    let run = scheduler.execute(&pipeline, &trigger, signal);
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();
    };

    let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(run, cancel) })
        .await
        .expect("cancelled run should finish promptly");

    assert_eq!(result.status, PipelineStatus::Cancelled);
    assert_eq!(exit_code(&result), EXIT_CANCELLED);
    assert_eq!(result.jobs.len(), 3);

    assert_job_status(&result, "quick", JobStatus::Succeeded);
    assert_job_status(&result, "slow", JobStatus::Cancelled);

    // The exclusive job either won the lock first or was still waiting
    let commands = log.commands();
    let queued_ran = commands.contains(&"queued".to_string());
    let expected = if queued_ran { JobStatus::Succeeded } else { JobStatus::Cancelled };
    assert_job_status(&result, "queued", expected);

    let slow = job(&result, "slow");
    assert_eq!(slow.steps.len(), 1);
    assert_eq!(slow.skipped_steps, 1);

    assert!(!commands.contains(&"after-slow".to_string()));
}

/// Cancelling after the run finished changes nothing
#[tokio::test]
async fn test_cancel_after_completion_keeps_results() {
    let pipeline = pipeline_from_yaml(YAML);
    let scheduler = PipelineScheduler::new(MockRunner::new(), ".");
    let handle = CancellationHandle::new();

    let result = scheduler.execute(&pipeline, &TriggerEvent::push(), handle.signal()).await;
    handle.cancel();

    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert!(result.jobs.iter().all(|j| j.status == JobStatus::Succeeded));
}
