//! Trigger events that select which jobs a pipeline run schedules

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of event that caused a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A push to a branch
    Push,
    /// A pull request was opened or updated
    PullRequest,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "push" => Ok(EventKind::Push),
            "pull_request" | "pr" => Ok(EventKind::PullRequest),
            other => Err(format!("Unknown trigger event: {}", other)),
        }
    }
}

/// The event a pipeline run was started for
///
/// The git reference is carried through to results and history but never
/// interpreted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: EventKind,

    #[serde(default)]
    pub git_ref: Option<String>,
}

impl TriggerEvent {
    pub fn push() -> Self {
        Self {
            kind: EventKind::Push,
            git_ref: None,
        }
    }

    pub fn pull_request() -> Self {
        Self {
            kind: EventKind::PullRequest,
            git_ref: None,
        }
    }

    pub fn with_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.git_ref = Some(git_ref.into());
        self
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.git_ref {
            Some(git_ref) => write!(f, "{} ({})", self.kind, git_ref),
            None => write!(f, "{}", self.kind),
        }
    }
}
