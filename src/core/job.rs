//! Job and step descriptors

use crate::core::{
    config::{JobConfig, StepConfig},
    trigger::EventKind,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// What a job does when one of its steps does not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failing step
    #[default]
    FailFast,
    /// Run every step and report the AND of their outcomes
    ContinueOnStepFailure,
}

/// One external command invocation within a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    /// Display name
    pub name: String,

    /// Executable to run
    pub command: String,

    /// Arguments, may reference `${VAR}` from the effective environment
    pub args: Vec<String>,

    /// Working directory relative to the workspace root
    pub working_directory: Option<PathBuf>,

    /// Maximum duration before the process is killed
    pub timeout: Option<Duration>,
}

impl StepDescriptor {
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            name: command.clone(),
            command,
            args: Vec::new(),
            working_directory: None,
            timeout: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn in_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Command line as it would be typed, for logs and summaries
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }

    pub fn from_config(config: &StepConfig, default_timeout: Option<Duration>) -> Self {
        Self {
            name: config.name.clone().unwrap_or_else(|| config.run.clone()),
            command: config.run.clone(),
            args: config.args.clone(),
            working_directory: config.working_directory.clone(),
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .or(default_timeout),
        }
    }
}

/// Static definition of one verification job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Unique name within the pipeline
    pub name: String,

    /// Steps in execution order
    pub steps: Vec<StepDescriptor>,

    /// Job-scoped environment overrides
    pub env: BTreeMap<String, String>,

    pub failure_policy: FailurePolicy,

    /// Whether the job may share the host with other jobs
    pub parallel: bool,

    /// Events this job runs for (None = every event the pipeline runs for)
    pub triggers: Option<Vec<EventKind>>,
}

impl JobDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            env: BTreeMap::new(),
            failure_policy: FailurePolicy::FailFast,
            parallel: true,
            triggers: None,
        }
    }

    pub fn step(mut self, step: StepDescriptor) -> Self {
        self.steps.push(step);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn continue_on_step_failure(mut self) -> Self {
        self.failure_policy = FailurePolicy::ContinueOnStepFailure;
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn only_on(mut self, kinds: Vec<EventKind>) -> Self {
        self.triggers = Some(kinds);
        self
    }

    /// Check whether this job applies to the given event
    pub fn runs_on(&self, kind: EventKind) -> bool {
        self.triggers
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&kind))
    }

    pub fn from_config(config: &JobConfig, default_timeout: Option<Duration>) -> Self {
        Self {
            name: config.name.clone(),
            steps: config
                .steps
                .iter()
                .map(|step| StepDescriptor::from_config(step, default_timeout))
                .collect(),
            env: config.env.clone(),
            failure_policy: if config.continue_on_step_failure {
                FailurePolicy::ContinueOnStepFailure
            } else {
                FailurePolicy::FailFast
            },
            parallel: config.parallel,
            triggers: config.on.clone(),
        }
    }
}
