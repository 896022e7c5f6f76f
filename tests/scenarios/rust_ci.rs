//! Test: the built-in Rust pipeline against scripted tool results

use crate::helpers::*;
use ci_orchestrator::core::{JobStatus, PipelineStatus, StepError, TriggerEvent};
use ci_orchestrator::execution::{exit_code, render_summary, EXIT_FAILURE, EXIT_SUCCESS};

const JOBS: [&str; 5] = ["format", "check", "test", "clippy", "doc"];

/// All five verification jobs pass
#[tokio::test]
async fn test_all_jobs_pass() {
    let pipeline = rust_ci_pipeline();
    let runner = MockRunner::new();
    let log = runner.log();

    let result = run_pipeline_with_mock(&pipeline, TriggerEvent::push(), runner).await;

    assert_pipeline_succeeded(&result);
    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert_eq!(exit_code(&result), EXIT_SUCCESS);
    assert_eq!(result.jobs.iter().map(|j| j.name.as_str()).collect::<Vec<_>>(), JOBS);
    assert_eq!(log.commands().len(), 5);
}

/// `cargo test` fails: the other four jobs still run and pass
#[tokio::test]
async fn test_failing_tests_fail_only_the_test_job() {
    let pipeline = rust_ci_pipeline();
    let runner = MockRunner::new().on("cargo test", MockStep::fails("test tests::it_works ... FAILED"));

    let result = run_pipeline_with_mock(&pipeline, TriggerEvent::pull_request(), runner).await;

    assert_failed_jobs(&result, &["test"]);
    assert_eq!(exit_code(&result), EXIT_FAILURE);
    assert_job_status(&result, "test", JobStatus::Failed);
    for name in ["format", "check", "clippy", "doc"] {
        assert_job_status(&result, name, JobStatus::Succeeded);
    }

    let test = job(&result, "test");
    assert_eq!(
        test.error,
        Some(StepError::StepFailed {
            step: "cargo test".to_string(),
            exit_code: Some(101),
        })
    );

    let summary = console::strip_ansi_codes(&render_summary(&result)).to_string();
    assert!(summary.contains("4/5 jobs passed"));
    assert!(summary.contains("it_works ... FAILED"));
}

/// A missing `cargo check` toolchain component is an infrastructure failure
#[tokio::test]
async fn test_missing_check_command_is_not_found() {
    let pipeline = rust_ci_pipeline();
    let runner = MockRunner::new().on("cargo check", MockStep::not_found());

    let result = run_pipeline_with_mock(&pipeline, TriggerEvent::push(), runner).await;

    assert_failed_jobs(&result, &["check"]);
    assert_job_status(&result, "check", JobStatus::NotFound);
    assert!(job(&result, "check").status.is_infrastructure_failure());
    assert!(matches!(job(&result, "check").error, Some(StepError::StepNotFound { .. })));
    assert_eq!(exit_code(&result), EXIT_FAILURE);

    let summary = console::strip_ansi_codes(&render_summary(&result)).to_string();
    assert!(summary.contains("infrastructure"));
}

/// Pipeline defaults reach every job; job overrides stay in their job
#[tokio::test]
async fn test_environment_is_resolved_per_job() {
    let mut pipeline = rust_ci_pipeline();
    pipeline.override_env([("CARGO_INCREMENTAL".to_string(), "0".to_string())]);
    let runner = MockRunner::new();
    let log = runner.log();

    run_pipeline_with_mock(&pipeline, TriggerEvent::push(), runner).await;

    let doc = log.env_for("cargo doc").expect("doc ran");
    let clippy = log.env_for("cargo clippy").expect("clippy ran");

    assert_eq!(doc.get("RUSTDOCFLAGS"), Some("-D warnings"));
    assert_eq!(clippy.get("RUSTDOCFLAGS"), None);
    for env in [&doc, &clippy] {
        assert_eq!(env.get("RUSTFLAGS"), Some("-D warnings"));
        assert_eq!(env.get("CARGO_TERM_COLOR"), Some("always"));
        assert_eq!(env.get("CARGO_INCREMENTAL"), Some("0"));
    }
}

/// Several failures are all reported, none hides another
#[tokio::test]
async fn test_multiple_failures_are_all_reported() {
    let pipeline = rust_ci_pipeline();
    let runner = MockRunner::new()
        .on("cargo fmt", MockStep::fails("Diff in src/lib.rs"))
        .on("cargo clippy", MockStep::fails("error: unused variable"));

    let result = run_pipeline_with_mock(&pipeline, TriggerEvent::push(), runner).await;

    assert_failed_jobs(&result, &["format", "clippy"]);
    assert_eq!(result.passed_count(), 3);
}
