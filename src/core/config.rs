//! Pipeline configuration from YAML

use crate::core::{error::PipelineError, trigger::EventKind, Pipeline};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Built-in pipeline for a single-workspace Rust project
pub const RUST_CI_PIPELINE: &str = include_str!("../../pipelines/rust-ci.yaml");

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Events the pipeline runs for
    #[serde(default = "default_triggers")]
    pub on: Vec<EventKind>,

    /// Default environment for every job
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Maximum number of jobs in flight (unbounded when absent)
    #[serde(default)]
    pub max_parallel: Option<usize>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Pipeline jobs
    pub jobs: Vec<JobConfig>,
}

/// Job configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Unique job name
    pub name: String,

    /// Restricts the job to a subset of the pipeline's events
    #[serde(default)]
    pub on: Option<Vec<EventKind>>,

    /// Job-scoped environment overrides
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Keep running steps after one fails
    #[serde(default)]
    pub continue_on_step_failure: bool,

    /// Whether this job can run alongside others
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Ordered steps
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Display name (defaults to the command)
    #[serde(default)]
    pub name: Option<String>,

    /// Executable to run
    pub run: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Relative to the workspace root
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Timeout for this step (overrides the pipeline default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_triggers() -> Vec<EventKind> {
    vec![EventKind::Push, EventKind::PullRequest]
}

fn default_parallel() -> bool {
    true
}

fn job_name_pattern() -> Regex {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("job name pattern is a valid regex")
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// The built-in Rust workspace pipeline
    pub fn rust_ci() -> Result<Self, PipelineError> {
        Self::from_yaml(RUST_CI_PIPELINE)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::Invalid(msg));

        if self.name.trim().is_empty() {
            return invalid("pipeline name is empty".to_string());
        }

        if self.max_parallel == Some(0) {
            return invalid("max_parallel must be at least 1".to_string());
        }

        if self.default_timeout_secs == Some(0) {
            return invalid("default_timeout_secs must be greater than zero".to_string());
        }

        let name_pattern = job_name_pattern();
        let mut seen = HashSet::new();
        for job in &self.jobs {
            if !name_pattern.is_match(&job.name) {
                return invalid(format!("Invalid job name: '{}'", job.name));
            }

            // Check that all job names are unique
            if !seen.insert(job.name.as_str()) {
                return invalid(format!("Duplicate job name: {}", job.name));
            }

            if job.steps.is_empty() {
                return invalid(format!("Job '{}' has no steps", job.name));
            }

            for (index, step) in job.steps.iter().enumerate() {
                if step.run.trim().is_empty() {
                    return invalid(format!(
                        "Job '{}' step {} has an empty command",
                        job.name,
                        index + 1
                    ));
                }
                if step.timeout_secs == Some(0) {
                    return invalid(format!(
                        "Job '{}' step {} has a zero timeout",
                        job.name,
                        index + 1
                    ));
                }
            }

            if let Some(on) = &job.on {
                if let Some(kind) = on.iter().find(|kind| !self.on.contains(kind)) {
                    return invalid(format!(
                        "Job '{}' runs on '{}' but the pipeline does not",
                        job.name, kind
                    ));
                }
            }
        }

        Ok(())
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}
