//! Test: job selection, completeness and concurrency limits

use crate::helpers::*;
use ci_orchestrator::core::{JobStatus, PipelineStatus, TriggerEvent};
use std::time::Duration;

fn pipeline_with_jobs(count: usize, extra: &str) -> String {
    let mut yaml = format!("name: wide\n{}\njobs:\n", extra);
    for i in 0..count {
        yaml.push_str(&format!("  - name: job-{}\n    steps:\n      - run: step-{}\n", i, i));
    }
    yaml
}

/// Every scheduled job yields exactly one result, whatever fails
#[tokio::test]
async fn test_one_result_per_scheduled_job() {
    for count in [1, 3, 8] {
        let pipeline = pipeline_from_yaml(&pipeline_with_jobs(count, ""));
        let runner = MockRunner::new()
            .on("step-0", MockStep::fails("boom"))
            .on("step-2", MockStep::not_found());

        let result = run_pipeline_with_mock(&pipeline, TriggerEvent::push(), runner).await;

        assert_eq!(result.jobs.len(), count);
        for (i, job) in result.jobs.iter().enumerate() {
            assert_eq!(job.name, format!("job-{}", i));
        }
    }
}

/// `max_parallel` bounds how many jobs run at once
#[tokio::test]
async fn test_max_parallel_from_definition() {
    let pipeline = pipeline_from_yaml(&pipeline_with_jobs(6, "max_parallel: 2"));
    let runner = MockRunner::new().on("step-", MockStep::slow(Duration::from_millis(40)));
    let log = runner.log();

    let result = run_pipeline_with_mock(&pipeline, TriggerEvent::push(), runner).await;

    assert_pipeline_succeeded(&result);
    assert!(log.peak() <= 2, "peak concurrency was {}", log.peak());
    assert!(log.peak() >= 1);
}

/// Without a limit, independent jobs overlap
#[tokio::test]
async fn test_jobs_run_concurrently() {
    let pipeline = pipeline_from_yaml(&pipeline_with_jobs(4, ""));
    let runner = MockRunner::new().on("step-", MockStep::slow(Duration::from_millis(100)));
    let log = runner.log();

    let started = std::time::Instant::now();
    let result = run_pipeline_with_mock(&pipeline, TriggerEvent::push(), runner).await;

    assert_pipeline_succeeded(&result);
    assert!(log.peak() > 1, "jobs never overlapped");
    assert!(started.elapsed() < Duration::from_millis(400));
}

/// A job with `parallel: false` never shares the host
#[tokio::test]
async fn test_exclusive_job_runs_alone() {
    for limit in ["", "max_parallel: 1", "max_parallel: 2"] {
        let yaml = format!(
            r#"
name: exclusive
{}
jobs:
  - name: lint
    steps:
      - run: shared-a
  - name: bench
    parallel: false
    steps:
      - run: exclusive-bench
  - name: test
    steps:
      - run: shared-b
  - name: doc
    steps:
      - run: shared-c
"#,
            limit
        );
        let pipeline = pipeline_from_yaml(&yaml);
        let runner = MockRunner::new()
            .on("shared", MockStep::slow(Duration::from_millis(30)))
            .on("exclusive", MockStep::slow(Duration::from_millis(30)));
        let log = runner.log();

        let result = run_pipeline_with_mock(&pipeline, TriggerEvent::push(), runner).await;

        assert_pipeline_succeeded(&result);
        assert_eq!(result.jobs.len(), 4);
        assert!(log.commands().contains(&"exclusive-bench".to_string()));
        assert_eq!(
            log.overlapping("exclusive-bench"),
            Vec::<String>::new(),
            "exclusive job shared the host with `{}`",
            limit
        );
    }
}

/// Job-level `on` restricts which events schedule the job
#[tokio::test]
async fn test_trigger_selects_jobs() {
    let yaml = r#"
name: triggers
on: [push, pull_request]
jobs:
  - name: always
    steps:
      - run: always
  - name: release-check
    on: [push]
    steps:
      - run: release
"#;
    let pipeline = pipeline_from_yaml(yaml);

    let push = run_pipeline_with_mock(&pipeline, TriggerEvent::push().with_ref("refs/heads/main"), MockRunner::new()).await;
    assert_eq!(push.jobs.len(), 2);
    assert_eq!(push.trigger.git_ref.as_deref(), Some("refs/heads/main"));

    let pr = run_pipeline_with_mock(&pipeline, TriggerEvent::pull_request(), MockRunner::new()).await;
    assert_eq!(pr.jobs.len(), 1);
    assert_job_status(&pr, "always", JobStatus::Succeeded);
    assert!(pr.job("release-check").is_none());
}

/// A pipeline not configured for the event schedules nothing and passes
#[tokio::test]
async fn test_untriggered_pipeline_schedules_nothing() {
    let yaml = r#"
name: push-only
on: [push]
jobs:
  - name: build
    steps:
      - run: build
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let runner = MockRunner::new();
    let log = runner.log();

    let result = run_pipeline_with_mock(&pipeline, TriggerEvent::pull_request(), runner).await;

    assert!(result.jobs.is_empty());
    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert!(log.commands().is_empty());
}
