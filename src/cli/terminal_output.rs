//! Terminal output for a running job
//!
//! `TerminalOutput` turns engine events into what the user sees: a
//! separator and `[1/3] build` header per step, the step's output as it
//! streams, and a progress bar over the steps.

use crate::cli::output::{create_progress_bar, format_execution_event};
use crate::execution::ExecutionEvent;
use console::style;
use indicatif::ProgressBar;

/// Renders execution events to the terminal
#[derive(Clone)]
pub struct TerminalOutput {
    progress: ProgressBar,
    show_output: bool,
}

impl TerminalOutput {
    /// Create terminal output for a job with `total_steps` steps
    ///
    /// When `show_output` is false step output only goes to the job log.
    pub fn new(total_steps: usize, show_output: bool) -> Self {
        Self {
            progress: create_progress_bar(total_steps),
            show_output,
        }
    }

    /// Terminal output that draws nothing
    pub fn hidden(show_output: bool) -> Self {
        Self {
            progress: ProgressBar::hidden(),
            show_output,
        }
    }

    /// Steps finished so far
    pub fn position(&self) -> u64 {
        self.progress.position()
    }

    fn println(&self, line: impl AsRef<str>) {
        self.progress.println(line);
    }

    fn print_separator(&self) {
        let width = term_size::dimensions_stdout()
            .map(|(w, _)| w)
            .unwrap_or(80);
        self.println(style("─".repeat(width)).dim().to_string());
    }

    /// Handle one engine event
    pub fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::StepStarted {
                step_name,
                index,
                total,
            } => {
                self.print_separator();
                self.println(format!(
                    "[{}/{}] {}",
                    style(index + 1).cyan(),
                    style(total).dim(),
                    style(step_name).bold()
                ));
                self.progress.set_message(step_name.clone());
            }
            ExecutionEvent::StepOutput { .. } => {
                if self.show_output {
                    self.println(format_execution_event(event));
                }
            }
            ExecutionEvent::StepCompleted { .. }
            | ExecutionEvent::StepFailed { .. }
            | ExecutionEvent::StepSkipped { .. } => {
                self.progress.inc(1);
                self.println(format_execution_event(event));
            }
            ExecutionEvent::JobCompleted { .. } => {
                self.progress.finish_and_clear();
                self.println(format_execution_event(event));
            }
            _ => self.println(format_execution_event(event)),
        }
    }
}
