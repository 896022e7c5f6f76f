//! ci-orchestrator - runs a repository's CI pipeline on push and pull request events

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use core::{
    EventKind, JobDescriptor, JobResult, JobStatus, Pipeline, PipelineError, PipelineResult, PipelineStatus,
    StepDescriptor, StepError, StepOutcome, StepResult, TriggerEvent,
};
pub use execution::{CancelSignal, CancellationHandle, ExecutionEvent, PipelineScheduler, ProcessStepRunner, StepRunner};
