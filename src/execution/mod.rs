//! Pipeline execution
//!
//! Steps run as child processes, jobs run their steps in order, and the
//! scheduler runs a trigger's jobs concurrently before aggregating them.

pub mod aggregator;
pub mod cancel;
pub mod job_runner;
pub mod scheduler;
pub mod step_runner;

pub use aggregator::{aggregate, exit_code, render_summary, EXIT_CANCELLED, EXIT_FAILURE, EXIT_SUCCESS};
pub use cancel::{CancelSignal, CancellationHandle};
pub use job_runner::JobRunner;
pub use scheduler::{EventEmitter, EventHandler, ExecutionEvent, PipelineScheduler};
pub use step_runner::{ProcessStepRunner, StepRunner};
