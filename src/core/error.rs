//! Error types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Why a job did not succeed
///
/// These are captured into results and rendered in the summary. They never
/// cross the job runner boundary as `Err` values.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepError {
    #[error("step '{step}' could not start `{command}`: {reason}")]
    StepNotFound {
        step: String,
        command: String,
        reason: String,
    },

    #[error("step '{step}' exited with {}", exit_status(.exit_code))]
    StepFailed {
        step: String,
        exit_code: Option<i32>,
    },

    #[error("step '{step}' timed out after {secs}s")]
    StepTimedOut { step: String, secs: u64 },

    #[error("job aborted after step '{step}' failed, {skipped} step(s) not run")]
    JobAborted { step: String, skipped: usize },

    #[error("pipeline cancelled")]
    PipelineCancelled,
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

/// Fatal orchestrator faults, reported before any job runs
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read pipeline definition {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed pipeline definition: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid pipeline definition: {0}")]
    Invalid(String),

    #[error("workspace {0} does not exist or is not a directory")]
    Workspace(PathBuf),
}
