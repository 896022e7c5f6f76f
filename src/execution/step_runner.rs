//! Step runner - executes one external command

use crate::{
    core::{EffectiveEnvironment, StepDescriptor, StepOutcome, StepResult},
    execution::CancelSignal,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// How long to keep draining a killed process's pipes
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Executes a single step - allows for different implementations
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Run a step and report its result
    ///
    /// Always returns a `StepResult`; failures to launch are reported as
    /// `StepOutcome::NotFound`, never as an error.
    async fn run(
        &self,
        step: &StepDescriptor,
        env: &EffectiveEnvironment,
        workspace: &Path,
        cancel: CancelSignal,
    ) -> StepResult;
}

/// Runs steps as child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessStepRunner;

impl ProcessStepRunner {
    pub fn new() -> Self {
        Self
    }
}

enum Completion {
    Exited(ExitStatus),
    WaitFailed(std::io::Error),
    TimedOut,
    Cancelled,
}

/// Output captured from a child's pipe, readable even if the reader is aborted
struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<()>,
}

impl Capture {
    fn spawn<R>(stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();
        let reader = tokio::spawn(async move {
            let Some(mut stream) = stream else { return };
            let mut chunk = [0u8; 8192];
            loop {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = sink.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                }
            }
        });
        Self { buffer, reader }
    }

    /// Wait briefly for the pipe to close, then take what was read
    async fn finish(mut self) -> String {
        if tokio::time::timeout(OUTPUT_GRACE, &mut self.reader).await.is_err() {
            // A grandchild still holds the pipe open
            self.reader.abort();
        }
        let bytes = self
            .buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

async fn expire(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}

/// Outcome of a process that exited on its own
///
/// Ctrl-C reaches the child's process group too, so a child killed by a
/// signal while the run is being cancelled counts as cancelled.
fn exit_outcome(status: ExitStatus, cancelled: bool) -> StepOutcome {
    if status.success() {
        StepOutcome::Succeeded
    } else if cancelled && status.code().is_none() {
        StepOutcome::Cancelled
    } else {
        StepOutcome::Failed
    }
}

fn working_directory(step: &StepDescriptor, workspace: &Path) -> PathBuf {
    match &step.working_directory {
        Some(dir) => workspace.join(dir),
        None => workspace.to_path_buf(),
    }
}

#[async_trait]
impl StepRunner for ProcessStepRunner {
    async fn run(
        &self,
        step: &StepDescriptor,
        env: &EffectiveEnvironment,
        workspace: &Path,
        mut cancel: CancelSignal,
    ) -> StepResult {
        let start = Instant::now();
        let args: Vec<String> = step.args.iter().map(|arg| env.expand(arg)).collect();
        let command_line = if args.is_empty() {
            step.command.clone()
        } else {
            format!("{} {}", step.command, args.join(" "))
        };
        let dir = working_directory(step, workspace);

        let result = |outcome, exit_code, stdout: String, stderr: String| StepResult {
            name: step.name.clone(),
            command: command_line.clone(),
            outcome,
            exit_code,
            stdout,
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if cancel.is_cancelled() {
            return result(StepOutcome::Cancelled, None, String::new(), "pipeline cancelled".to_string());
        }

        debug!("Spawning `{}` in {}", command_line, dir.display());

        let mut child = match Command::new(&step.command)
            .args(&args)
            .envs(env.iter())
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Step {} could not start `{}`: {}", step.name, step.command, e);
                let message = format!("failed to start `{}` in {}: {}", step.command, dir.display(), e);
                return result(StepOutcome::NotFound, None, String::new(), message);
            }
        };

        let stdout = Capture::spawn(child.stdout.take());
        let stderr = Capture::spawn(child.stderr.take());

        let completion = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => Completion::Exited(status),
                Err(e) => Completion::WaitFailed(e),
            },
            _ = expire(step.timeout) => Completion::TimedOut,
            _ = cancel.cancelled() => Completion::Cancelled,
        };

        if matches!(completion, Completion::TimedOut | Completion::Cancelled) {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill step {}: {}", step.name, e);
            }
        }

        let stdout = stdout.finish().await;
        let mut stderr = stderr.finish().await;

        match completion {
            Completion::Exited(status) => {
                let outcome = exit_outcome(status, cancel.is_cancelled());
                info!("Step {} finished: {}", step.name, status);
                result(outcome, status.code(), stdout, stderr)
            }
            Completion::WaitFailed(e) => {
                warn!("Lost track of step {}: {}", step.name, e);
                stderr.push_str(&format!("\nfailed to wait for process: {}", e));
                result(StepOutcome::Failed, None, stdout, stderr)
            }
            Completion::TimedOut => {
                let secs = step.timeout.map(|t| t.as_secs_f64()).unwrap_or_default();
                warn!("Step {} timed out after {:.1}s", step.name, secs);
                result(StepOutcome::TimedOut, None, stdout, stderr)
            }
            Completion::Cancelled => {
                info!("Step {} cancelled", step.name);
                result(StepOutcome::Cancelled, None, stdout, stderr)
            }
        }
    }
}
