//! CLI command definitions

use crate::core::{config::PipelineConfig, EventKind, PipelineError};
use clap::Args;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Run the pipeline for a trigger event
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file (defaults to the built-in Rust pipeline)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Trigger event: push or pull-request
    #[arg(long, env = "CI_EVENT", default_value = "push")]
    pub event: EventKind,

    /// Git reference the event refers to
    #[arg(long = "ref", env = "CI_REF")]
    pub git_ref: Option<String>,

    /// Checked-out workspace the jobs run in
    #[arg(short, long, default_value = ".")]
    pub workspace: PathBuf,

    /// Maximum number of jobs in flight (overrides the pipeline)
    #[arg(long)]
    pub max_parallel: Option<NonZeroUsize>,

    /// Environment overrides applied to every job (KEY=VALUE)
    #[arg(short, long, value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Print the result as JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file (defaults to the built-in Rust pipeline)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List the jobs a pipeline defines
#[derive(Debug, Args, Clone)]
pub struct JobsCommand {
    /// Path to pipeline YAML file (defaults to the built-in Rust pipeline)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Only list jobs scheduled for this event
    #[arg(long)]
    pub event: Option<EventKind>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run by ID
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Load the pipeline at `file`, or the built-in one
pub fn load_config(file: Option<&PathBuf>) -> Result<PipelineConfig, PipelineError> {
    match file {
        Some(path) => PipelineConfig::from_file(path),
        None => PipelineConfig::rust_ci(),
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
