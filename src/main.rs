use anyhow::{Context, Result};
use ci_orchestrator::cli::commands::{load_config, HistoryCommand, JobsCommand, RunCommand, ValidateCommand};
use ci_orchestrator::cli::output::*;
use ci_orchestrator::cli::{Cli, Command};
use ci_orchestrator::core::{Pipeline, PipelineError, TriggerEvent};
use ci_orchestrator::execution::{self, CancellationHandle, ExecutionEvent, PipelineScheduler, ProcessStepRunner};
use ci_orchestrator::persistence::{create_summary, open_backend};
use std::sync::Arc;
use tracing::{debug, error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit code for a pipeline definition or workspace that cannot be used
const EXIT_INVALID: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; the summary owns stdout
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => {
            let code = run_pipeline(cmd, cli.verbose).await?;
            std::process::exit(code);
        }
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Jobs(cmd) => list_jobs(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

fn invalid(err: PipelineError) -> ! {
    eprintln!("{} {}", CROSS, style(&err).red());
    std::process::exit(EXIT_INVALID);
}

async fn run_pipeline(cmd: &RunCommand, verbose: bool) -> Result<i32> {
    let config = load_config(cmd.file.as_ref()).unwrap_or_else(|e| invalid(e));
    if !cmd.workspace.is_dir() {
        invalid(PipelineError::Workspace(cmd.workspace.clone()));
    }

    let mut pipeline = Pipeline::from_config(&config);
    pipeline.override_env(cmd.env.iter().cloned());
    for (key, value) in &cmd.env {
        debug!("Environment override: {}={}", key, value);
    }

    let trigger = TriggerEvent {
        kind: cmd.event,
        git_ref: cmd.git_ref.clone(),
    };

    let mut scheduler = PipelineScheduler::new(ProcessStepRunner::new(), cmd.workspace.clone())
        .with_max_parallel(cmd.max_parallel.map(|n| n.get()));

    // Progress on stderr; the summary or JSON goes to stdout
    if !cmd.json {
        let total = pipeline.jobs_for(&trigger).len();
        let progress = if verbose { None } else { Some(create_progress_bar(total)) };
        scheduler.add_event_handler(move |event| {
            let line = format_execution_event(&event);
            match (&progress, &event) {
                (None, _) => eprintln!("{}", line),
                (Some(bar), ExecutionEvent::JobStarted { job }) => bar.set_message(job.clone()),
                (Some(bar), ExecutionEvent::JobFinished { .. }) => {
                    bar.println(line);
                    bar.inc(1);
                }
                (Some(bar), ExecutionEvent::PipelineFinished { .. }) => bar.finish_and_clear(),
                (Some(bar), ExecutionEvent::PipelineStarted { .. }) => bar.println(line),
                _ => {}
            }
        });
    }

    let handle = Arc::new(CancellationHandle::new());
    let signal = handle.signal();
    let interrupt = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling pipeline");
            interrupt.cancel();
        }
    });

    let result = scheduler.execute(&pipeline, &trigger, signal).await;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", execution::render_summary(&result));
    }

    // History is best-effort and never changes the exit code
    let summary = create_summary(&result);
    match open_backend(cmd.no_history).await {
        Ok(store) => match store.save_run(&summary).await {
            Ok(()) => {
                if !cmd.no_history && !cmd.json {
                    eprintln!(
                        "{} Run saved to history (ID: {})",
                        INFO,
                        style(&summary.run_id.to_string()[..8]).dim()
                    );
                }
            }
            Err(e) => error!("Failed to save run history: {:#}", e),
        },
        Err(e) => error!("Run history unavailable: {:#}", e),
    }

    Ok(execution::exit_code(&result))
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    let config = match load_config(cmd.file.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(EXIT_INVALID);
        }
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("{} Pipeline definition is valid!", CHECK);
    println!("  Name: {}", style(&config.name).bold());
    println!(
        "  Triggers: {}",
        style(config.on.iter().map(|e| e.as_str()).collect::<Vec<_>>().join(", ")).cyan()
    );
    println!("  Jobs: {}", style(config.jobs.len()).cyan());
    println!("  Variables: {}", style(config.env.len()).cyan());
    if let Some(max) = config.max_parallel {
        println!("  Max parallel: {}", style(max).cyan());
    }

    Ok(())
}

fn list_jobs(cmd: &JobsCommand) -> Result<()> {
    let config = load_config(cmd.file.as_ref()).unwrap_or_else(|e| invalid(e));
    let pipeline = Pipeline::from_config(&config);

    let jobs = match cmd.event {
        Some(kind) => pipeline.jobs_for(&TriggerEvent { kind, git_ref: None }),
        None => pipeline.jobs.iter().collect(),
    };

    if cmd.json {
        let data: Vec<_> = jobs
            .iter()
            .map(|job| {
                serde_json::json!({
                    "name": job.name,
                    "parallel": job.parallel,
                    "steps": job.steps.iter().map(|s| s.command_line()).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "jobs": data }))?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("{} No jobs scheduled", INFO);
        return Ok(());
    }

    println!("{} Jobs in {}:", INFO, style(&pipeline.name).bold());
    for job in jobs {
        let mode = if job.parallel { "" } else { " (exclusive)" };
        println!("  {}{}", style(&job.name).bold(), style(mode).yellow());
        for step in &job.steps {
            println!("    {} {}", style("›").dim(), step.command_line());
        }
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_backend(false).await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) if cmd.json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => {
                println!("{} Run Details", INFO);
                println!("  ID: {}", style(summary.run_id).cyan());
                println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
                println!("  Trigger: {}", summary.trigger);
                if let Some(git_ref) = &summary.git_ref {
                    println!("  Ref: {}", git_ref);
                }
                println!("  Status: {}", format_status(summary.status));
                println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
                println!("  Finished: {}", style(summary.finished_at.to_rfc3339()).dim());
                println!(
                    "  Jobs: {}/{} passed",
                    style(summary.passed_jobs()).cyan(),
                    summary.total_jobs
                );
                if !summary.failed_jobs.is_empty() {
                    println!("  Failed: {}", style(summary.failed_jobs.join(", ")).red());
                }
            }
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let runs = store.list_runs(cmd.pipeline.as_deref(), cmd.limit).await?;

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, runs.len());
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(())
}
