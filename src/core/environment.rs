//! Environment resolution for job steps
//!
//! Pipeline-wide defaults are an explicit value handed to the resolver at
//! load time. Each job gets its own resolved copy; nothing is written back.

use crate::core::job::JobDescriptor;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("variable pattern is a valid regex")
    })
}

/// Fully resolved variable mapping passed to one job's steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveEnvironment {
    vars: BTreeMap<String, String>,
}

impl EffectiveEnvironment {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    /// Replace `${NAME}` references with resolved values
    ///
    /// Unknown names are left as written.
    pub fn expand(&self, input: &str) -> String {
        variable_pattern()
            .replace_all(input, |caps: &Captures| match self.vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

impl From<BTreeMap<String, String>> for EffectiveEnvironment {
    fn from(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }
}

/// Merges pipeline defaults with job-scoped overrides
#[derive(Debug, Clone, Default)]
pub struct EnvironmentResolver {
    defaults: BTreeMap<String, String>,
}

impl EnvironmentResolver {
    pub fn new(defaults: BTreeMap<String, String>) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    /// Overlay `overrides` onto the defaults
    ///
    /// Overrides add or replace keys; keys only present in the defaults
    /// pass through unchanged.
    pub fn resolve_overrides(&self, overrides: &BTreeMap<String, String>) -> EffectiveEnvironment {
        let mut vars = self.defaults.clone();
        vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        EffectiveEnvironment { vars }
    }

    /// Resolve the environment for a job's steps
    pub fn resolve(&self, job: &JobDescriptor) -> EffectiveEnvironment {
        self.resolve_overrides(&job.env)
    }
}
