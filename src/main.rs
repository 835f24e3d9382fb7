use anyhow::{Context, Result};
use jobrunner::artifact::LocalArtifactStore;
use jobrunner::cli::commands::{HistoryCommand, RunCommand, SelectCommand, ValidateCommand};
use jobrunner::cli::output::*;
use jobrunner::cli::terminal_output::TerminalOutput;
use jobrunner::cli::{Cli, Command};
use jobrunner::core::config::JobConfig;
use jobrunner::core::{EventContext, ExecutionStatus};
use jobrunner::execution::{ExecutionEngine, ShellExecutor};
use jobrunner::persistence::{
    create_summary, or_in_memory, InMemoryPersistence, PersistenceBackend, RunSummary,
};
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let exit_code = match &cli.command {
        Command::Run(cmd) => run_job(cmd, cli.quiet).await?,
        Command::Validate(cmd) => validate_job(cmd)?,
        Command::Select(cmd) => select_runner(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn open_history(no_history: bool) -> Result<Arc<dyn PersistenceBackend>> {
    if no_history {
        return Ok(Arc::new(InMemoryPersistence::new()));
    }

    #[cfg(feature = "sqlite")]
    {
        Ok(Arc::new(
            jobrunner::persistence::SqliteRunStore::with_default_path().await?,
        ))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        warn!("Built without the sqlite feature, run history is not kept");
        Ok(Arc::new(InMemoryPersistence::new()))
    }
}

async fn run_job(cmd: &RunCommand, quiet: bool) -> Result<i32> {
    let config = JobConfig::from_file(&cmd.file).context("Failed to load job config")?;

    println!("{} Loaded job: {}", INFO, style(&config.name).bold());

    let mut job = config.to_job()?;

    for (key, value) in &cmd.variable {
        job.variables.insert(key.clone(), value.clone());
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let store = or_in_memory(open_history(cmd.no_history).await);

    let publisher = match &cmd.artifact_dir {
        Some(dir) => LocalArtifactStore::new(dir),
        None => LocalArtifactStore::with_default_path(),
    };
    let engine = ExecutionEngine::new(ShellExecutor::new(), publisher);

    let output = TerminalOutput::new(job.steps.len(), !quiet);
    engine.add_event_handler(move |event| output.on_event(&event));

    let event = EventContext::new(cmd.repository.trim(), cmd.base_ref.trim());

    println!();
    let outcome = tokio::select! {
        result = engine.execute(&mut job, &event) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let exit_code = match outcome {
        Some(Ok(status)) if status.is_success() => {
            let verb = if status == ExecutionStatus::Skipped {
                style("skipped").dim()
            } else {
                style("successfully").green()
            };
            println!("\n{} {} finished {}", CHECK, style(&job.name).bold(), verb);
            0
        }
        Some(Ok(_)) => {
            println!("\n{} {} {}", CROSS, style(&job.name).bold(), style("failed").red());
            for step in &job.steps {
                println!("{}", format_step_summary(step));
            }
            1
        }
        Some(Err(e)) => {
            error!("{}", e);
            println!("\n{} {} {}: {}", CROSS, style(&job.name).bold(), style("failed").red(), e);
            1
        }
        None => {
            job.cancel("job cancelled");
            println!("\n{} {} {}", WARN, style(&job.name).bold(), style("cancelled").yellow());
            for step in &job.steps {
                println!("{}", format_step_summary(step));
            }
            EXIT_INTERRUPTED
        }
    };

    if !cmd.no_history {
        let summary = create_summary(&job);
        match store.save_run(&summary).await {
            Ok(()) => println!(
                "{} Run saved to history (ID: {})",
                INFO,
                style(summary.execution_id).dim()
            ),
            Err(e) => warn!("Failed to save run history: {:#}", e),
        }
    }

    Ok(exit_code)
}

fn validate_job(cmd: &ValidateCommand) -> Result<i32> {
    println!("{} Validating job...", INFO);

    let config = match JobConfig::from_file(&cmd.file) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            return Ok(1);
        }
    };

    let selector = config.selector()?;

    println!("{} Job configuration is valid!", CHECK);
    println!("  Name: {}", style(&config.name).bold());
    println!("  Steps: {}", style(config.steps.len()).cyan());
    println!("  Artifacts: {}", style(config.artifacts.len()).cyan());
    println!("  Runners:");
    for rule in selector.rules() {
        println!(
            "    {} when {}",
            style(&rule.runner_class).cyan(),
            style(&rule.when).dim()
        );
    }

    for name in config.undeclared_variables() {
        println!(
            "{} Placeholder {} is not a declared variable and will be left as written",
            WARN,
            style(format!("{{{{ {} }}}}", name)).yellow()
        );
    }

    if cmd.json {
        let json = serde_json::to_string_pretty(&config)?;
        println!("\n{}", json);
    }

    Ok(0)
}

fn select_runner(cmd: &SelectCommand) -> Result<i32> {
    let config = JobConfig::from_file(&cmd.file).context("Failed to load job config")?;
    let selector = config.selector()?;
    let event = EventContext::new(cmd.repository.trim(), cmd.base_ref.trim());

    match selector.select(&event) {
        Ok(runner_class) => {
            println!("{}", runner_class);
            Ok(0)
        }
        Err(e) => {
            eprintln!("{} {}", CROSS, style(e).red());
            Ok(1)
        }
    }
}

async fn show_history(cmd: &HistoryCommand) -> Result<i32> {
    let store = open_history(false).await?;

    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id =
            uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;

        match store.load_run(exec_id).await? {
            Some(summary) => print_run_details(&summary, cmd.verbose)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(0);
    }

    let mut runs = if let Some(job_name) = &cmd.job {
        store.list_runs(job_name).await?
    } else {
        let mut all_runs = Vec::new();
        for job_name in store.list_jobs().await? {
            all_runs.extend(store.list_runs(&job_name).await?);
        }
        all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_runs
    };
    runs.truncate(cmd.limit);

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(0);
    }

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Run history (showing latest {}):", INFO, cmd.limit);
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(0)
}

fn print_run_details(summary: &RunSummary, verbose: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Job: {}", style(&summary.job_name).bold());
    println!(
        "  Runner: {}",
        style(summary.runner_class.as_deref().unwrap_or("-")).cyan()
    );
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Steps: {} completed, {} failed, {} total",
        style(summary.completed_steps).green(),
        style(summary.failed_steps).red(),
        summary.total_steps
    );

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
