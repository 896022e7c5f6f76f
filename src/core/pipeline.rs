//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    environment::EnvironmentResolver,
    job::JobDescriptor,
    trigger::{EventKind, TriggerEvent},
};
use std::collections::BTreeMap;
use std::time::Duration;

/// A loaded pipeline definition
///
/// Jobs form a flat set: none depends on another's output.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Events the pipeline runs for
    pub triggers: Vec<EventKind>,

    /// Default environment applied to every job
    pub env: BTreeMap<String, String>,

    /// Maximum number of jobs in flight (None = all at once)
    pub max_parallel: Option<usize>,

    /// Jobs in declared order
    pub jobs: Vec<JobDescriptor>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triggers: vec![EventKind::Push, EventKind::PullRequest],
            env: BTreeMap::new(),
            max_parallel: None,
            jobs: Vec::new(),
        }
    }

    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let default_timeout = config.default_timeout_secs.map(Duration::from_secs);

        Pipeline {
            name: config.name.clone(),
            triggers: config.on.clone(),
            env: config.env.clone(),
            max_parallel: config.max_parallel,
            jobs: config
                .jobs
                .iter()
                .map(|job| JobDescriptor::from_config(job, default_timeout))
                .collect(),
        }
    }

    pub fn job(mut self, job: JobDescriptor) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: Option<usize>) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    /// Apply command-line overrides to the default environment
    pub fn override_env<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(overrides);
    }

    /// Get a job by name
    pub fn get_job(&self, name: &str) -> Option<&JobDescriptor> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// Jobs scheduled for the given trigger, in declared order
    pub fn jobs_for(&self, trigger: &TriggerEvent) -> Vec<&JobDescriptor> {
        if !self.triggers.contains(&trigger.kind) {
            return Vec::new();
        }

        self.jobs
            .iter()
            .filter(|job| job.runs_on(trigger.kind))
            .collect()
    }

    /// Environment resolver seeded with this pipeline's defaults
    pub fn resolver(&self) -> EnvironmentResolver {
        EnvironmentResolver::new(self.env.clone())
    }
}
