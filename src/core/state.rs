//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Job has not started
    Pending,
    /// Job is currently running
    Running,
    /// Job completed successfully
    Completed,
    /// Job failed
    Failed,
    /// Job condition did not hold
    Skipped,
    /// Job was interrupted
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Skipped)
    }
}

/// State of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not run yet
    Pending,
    /// Step command is running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Command exited with status zero
    Completed {
        exit_code: i32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Command failed; `continued` is set when the job carried on regardless
    Failed {
        error: String,
        exit_code: Option<i32>,
        continued: bool,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Step never ran
    Skipped {
        reason: String,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Completed { .. } | StepState::Failed { .. } | StepState::Skipped { .. }
        )
    }

    /// A failure that was not covered by `continue_on_error`
    pub fn is_fatal_failure(&self) -> bool {
        matches!(self, StepState::Failed { continued: false, .. })
    }
}

/// Overall job state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Current execution status
    pub status: ExecutionStatus,

    /// Runner class chosen for this execution
    pub runner_class: Option<String>,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution finished
    pub completed_at: Option<DateTime<Utc>>,

    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
}

impl JobState {
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            runner_class: None,
            started_at: None,
            completed_at: None,
            total_steps: 0,
            completed_steps: 0,
            failed_steps: 0,
            skipped_steps: 0,
        }
    }

    /// Mark job as started on the given runner class
    pub fn start(&mut self, runner_class: &str, total_steps: usize) {
        self.status = ExecutionStatus::Running;
        self.runner_class = Some(runner_class.to_string());
        self.started_at.get_or_insert_with(Utc::now);
        self.total_steps = total_steps;
    }

    pub fn complete(&mut self) {
        self.finish(ExecutionStatus::Completed);
    }

    pub fn fail(&mut self) {
        self.finish(ExecutionStatus::Failed);
    }

    pub fn skip(&mut self) {
        self.finish(ExecutionStatus::Skipped);
    }

    pub fn cancel(&mut self) {
        self.finish(ExecutionStatus::Cancelled);
    }

    fn finish(&mut self, status: ExecutionStatus) {
        let now = Utc::now();
        self.status = status;
        self.started_at.get_or_insert(now);
        self.completed_at = Some(now);
    }

    pub fn update_counts(&mut self, total: usize, completed: usize, failed: usize, skipped: usize) {
        self.total_steps = total;
        self.completed_steps = completed;
        self.failed_steps = failed;
        self.skipped_steps = skipped;
    }

    /// Fraction of steps in a terminal state (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        (self.completed_steps + self.failed_steps + self.skipped_steps) as f64
            / self.total_steps as f64
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}
