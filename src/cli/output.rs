//! CLI output formatting

use crate::{
    core::{ExecutionStatus, Step, StepState},
    execution::{ExecutionEvent, OutputStream},
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "* ");

/// Create a progress bar over the steps of a job
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { .. } => style("RUNNING").yellow().to_string(),
        StepState::Completed { .. } => style("COMPLETED").green().to_string(),
        StepState::Failed {
            continued: true, ..
        } => style("FAILED (continued)").yellow().to_string(),
        StepState::Failed { .. } => style("FAILED").red().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// One line per step for the end-of-run report
pub fn format_step_summary(step: &Step) -> String {
    let detail = match &step.state {
        StepState::Failed { error, .. } => format!(": {}", style(error).dim()),
        StepState::Skipped { reason } => format!(" ({})", style(reason).dim()),
        _ => String::new(),
    };
    format!(
        "  {} {}{}",
        format_step_state(&step.state),
        style(&step.name).bold(),
        detail
    )
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Skipped => style("SKIPPED").dim().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// Format a run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        _ => INFO,
    };

    format!(
        "{} {} - {} on {} - {} ({}/{} steps)",
        status_icon,
        style(short_id(&summary.execution_id)).dim(),
        style(&summary.job_name).bold(),
        style(summary.runner_class.as_deref().unwrap_or("-")).cyan(),
        format_status(summary.status),
        summary.completed_steps,
        summary.total_steps,
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::JobStarted {
            execution_id,
            job_name,
        } => format!(
            "{} Starting job {} ({})",
            ROCKET,
            style(job_name).bold(),
            style(short_id(execution_id)).dim()
        ),
        ExecutionEvent::RunnerSelected { runner_class } => {
            format!("{} Runner: {}", INFO, style(runner_class).cyan())
        }
        ExecutionEvent::StepStarted {
            step_name,
            index,
            total,
        } => format!(
            "{} [{}/{}] {}",
            SPINNER,
            index + 1,
            total,
            style(step_name).cyan()
        ),
        ExecutionEvent::StepOutput { line, stream, .. } => match stream {
            OutputStream::Stdout => line.clone(),
            OutputStream::Stderr => style(line).dim().to_string(),
        },
        ExecutionEvent::StepCompleted { step_name } => {
            format!("{} {}", CHECK, style(step_name).green())
        }
        ExecutionEvent::StepFailed {
            step_name,
            error,
            continued,
        } => {
            if *continued {
                format!(
                    "{} {}: {} (continuing)",
                    WARN,
                    style(step_name).yellow(),
                    style(error).dim()
                )
            } else {
                format!("{} {}: {}", CROSS, style(step_name).red(), style(error).dim())
            }
        }
        ExecutionEvent::StepSkipped { step_name, reason } => format!(
            "{} {} skipped ({})",
            INFO,
            style(step_name).dim(),
            reason
        ),
        ExecutionEvent::ArtifactPublished {
            name,
            destination,
            bytes,
        } => format!(
            "{} Published {} ({} bytes) to {}",
            PACKAGE,
            style(name).bold(),
            bytes,
            style(destination).dim()
        ),
        ExecutionEvent::ArtifactSkipped { name, reason } => {
            format!("{} Artifact {} skipped: {}", WARN, style(name).yellow(), reason)
        }
        ExecutionEvent::ArtifactFailed {
            name,
            error,
            continued,
        } => {
            let icon = if *continued { WARN } else { CROSS };
            format!("{} Artifact {}: {}", icon, style(name).red(), style(error).dim())
        }
        ExecutionEvent::JobCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => {
                    format!("completed {}", style("successfully").green())
                }
                ExecutionStatus::Failed => style("failed").red().to_string(),
                ExecutionStatus::Skipped => style("skipped").dim().to_string(),
                other => format!("{:?}", other),
            };
            format!(
                "{} Job ({}) {}",
                INFO,
                style(short_id(execution_id)).dim(),
                status_str
            )
        }
    }
}

/// Format a duration as `1h 2m 3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StepConfig;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_step_events_mention_step_name() {
        let started = format_execution_event(&ExecutionEvent::StepStarted {
            step_name: "lint".to_string(),
            index: 1,
            total: 3,
        });
        assert!(started.contains("[2/3]"));
        assert!(started.contains("lint"));

        let failed = format_execution_event(&ExecutionEvent::StepFailed {
            step_name: "lint".to_string(),
            error: "Command exited with code 2".to_string(),
            continued: true,
        });
        assert!(failed.contains("continuing"));
    }

    fn step(name: &str, state: StepState) -> Step {
        let config = StepConfig {
            name: name.to_string(),
            run: "true".to_string(),
            env: Default::default(),
            continue_on_error: false,
            working_directory: None,
            timeout_secs: None,
        };
        let mut step = Step::from_config(&config, None);
        step.state = state;
        step
    }

    #[test]
    fn test_step_summary_shows_state_and_cause() {
        let now = chrono::Utc::now();

        let done = format_step_summary(&step(
            "build",
            StepState::Completed {
                exit_code: 0,
                started_at: now,
                completed_at: now,
            },
        ));
        assert!(done.contains("COMPLETED"));
        assert!(done.contains("build"));

        let failed = format_step_summary(&step(
            "test",
            StepState::Failed {
                error: "Command exited with code 2".to_string(),
                exit_code: Some(2),
                continued: false,
                started_at: now,
                failed_at: now,
            },
        ));
        assert!(failed.contains("FAILED"));
        assert!(!failed.contains("continued"));
        assert!(failed.contains("Command exited with code 2"));

        let tolerated = format_step_summary(&step(
            "lint",
            StepState::Failed {
                error: "Command exited with code 1".to_string(),
                exit_code: Some(1),
                continued: true,
                started_at: now,
                failed_at: now,
            },
        ));
        assert!(tolerated.contains("FAILED (continued)"));

        let skipped = format_step_summary(&step(
            "deploy",
            StepState::Skipped {
                reason: "previous step failed".to_string(),
            },
        ));
        assert!(skipped.contains("SKIPPED"));
        assert!(skipped.contains("previous step failed"));
    }
}
