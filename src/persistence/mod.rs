//! Persistence layer for pipeline run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{EventKind, PipelineResult, PipelineStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    pub pipeline_name: String,

    /// Event the run was started for
    pub trigger: EventKind,

    /// Git reference passed with the trigger, if any
    pub git_ref: Option<String>,

    pub status: PipelineStatus,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Number of jobs scheduled
    pub total_jobs: usize,

    /// Names of jobs that did not succeed, in declared order
    pub failed_jobs: Vec<String>,
}

impl RunSummary {
    pub fn passed_jobs(&self) -> usize {
        self.total_jobs.saturating_sub(self.failed_jobs.len())
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List the most recent runs, newest first, optionally for one pipeline
    async fn list_runs(&self, pipeline_name: Option<&str>, limit: usize) -> Result<Vec<RunSummary>>;

    /// List all pipeline names with recorded runs
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory persistence, lost when the process exits
#[derive(Default)]
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        self.runs.write().await.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: Option<&str>, limit: usize) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .values()
            .filter(|run| pipeline_name.map_or(true, |name| run.pipeline_name == name))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        result.truncate(limit);
        Ok(result)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.values().map(|run| run.pipeline_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Create a summary from a pipeline result
pub fn create_summary(result: &PipelineResult) -> RunSummary {
    RunSummary {
        run_id: result.run_id,
        pipeline_name: result.pipeline_name.clone(),
        trigger: result.trigger.kind,
        git_ref: result.trigger.git_ref.clone(),
        status: result.status,
        started_at: result.started_at,
        finished_at: result.finished_at,
        total_jobs: result.jobs.len(),
        failed_jobs: result.failed_jobs().map(|j| j.name.clone()).collect(),
    }
}

/// Open the history backend for a run
///
/// `--no-history` runs and builds without the `sqlite` feature keep history in memory only.
pub async fn open_backend(no_history: bool) -> Result<Arc<dyn PersistenceBackend>> {
    if no_history {
        return Ok(Arc::new(InMemoryPersistence::new()));
    }

    #[cfg(feature = "sqlite")]
    return Ok(Arc::new(SqliteRunStore::with_default_path().await?));

    #[cfg(not(feature = "sqlite"))]
    {
        tracing::warn!("Built without the `sqlite` feature, run history is not kept");
        Ok(Arc::new(InMemoryPersistence::new()))
    }
}
