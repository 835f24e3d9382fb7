//! Job domain model

use crate::artifact::ArtifactSpec;
use crate::core::{
    config::JobConfig,
    selector::{EventContext, Predicate, RunnerSelector},
    state::{JobState, StepState},
    step::Step,
};
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;

/// A job definition plus its runtime state
#[derive(Debug, Clone)]
pub struct Job {
    /// Job name
    pub name: String,

    /// Job runs only when this holds (None = always)
    pub condition: Option<Predicate>,

    /// Runner selection rules
    pub selector: RunnerSelector,

    /// Variables available to commands
    pub variables: HashMap<String, String>,

    /// Environment shared by all steps
    pub env: HashMap<String, String>,

    /// Steps in execution order
    pub steps: Vec<Step>,

    /// Files published when the job finishes
    pub artifacts: Vec<ArtifactSpec>,

    /// Path template of the job log
    pub log_file: Option<String>,

    /// Execution state
    pub state: JobState,
}

impl Job {
    /// Create a job from configuration
    pub fn from_config(config: &JobConfig) -> Result<Self> {
        let condition = config
            .condition
            .as_ref()
            .map(|c| c.to_predicate())
            .transpose()
            .context("Invalid job condition")?;

        let steps = config
            .steps
            .iter()
            .map(|step_config| Step::from_config(step_config, config.default_timeout_secs))
            .collect();

        Ok(Job {
            name: config.name.clone(),
            condition,
            selector: config.selector()?,
            variables: config.variables(),
            env: config.env.clone(),
            steps,
            artifacts: config.artifact_specs(),
            log_file: config.log_file.clone(),
            state: JobState::new(),
        })
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Get a mutable step by name
    pub fn step_mut(&mut self, name: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.name == name)
    }

    /// Whether the job should run for this event
    pub fn should_run(&self, event: &EventContext) -> bool {
        self.condition.as_ref().map_or(true, |c| c.matches(event))
    }

    /// All steps reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.state.is_terminal())
    }

    /// Name of the first step whose failure stops the job
    pub fn first_fatal_failure(&self) -> Option<&str> {
        self.steps
            .iter()
            .find(|s| s.state.is_fatal_failure())
            .map(|s| s.name.as_str())
    }

    /// Recount step states into the job state
    pub fn update_counts(&mut self) {
        let mut completed = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for step in &self.steps {
            match &step.state {
                StepState::Completed { .. } => completed += 1,
                StepState::Failed { .. } => failed += 1,
                StepState::Skipped { .. } => skipped += 1,
                _ => {}
            }
        }

        self.state.update_counts(self.steps.len(), completed, failed, skipped);
    }

    /// Stop the job: the running step fails, steps that have not run are skipped
    pub fn cancel(&mut self, reason: &str) {
        for step in &mut self.steps {
            if let StepState::Running { started_at } = step.state {
                step.state = StepState::Failed {
                    error: reason.to_string(),
                    exit_code: None,
                    continued: false,
                    started_at,
                    failed_at: Utc::now(),
                };
            }
        }
        self.skip_remaining(reason);
        self.update_counts();
        self.state.cancel();
    }

    /// Mark every step that has not run as skipped
    pub fn skip_remaining(&mut self, reason: &str) {
        for step in &mut self.steps {
            if matches!(step.state, StepState::Pending) {
                step.state = StepState::Skipped {
                    reason: reason.to_string(),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: "engine"
if:
  repository: "dagger/dagger"
steps:
  - name: "lint"
    run: "make lint"
    continue_on_error: true
  - name: "test"
    run: "make test"
    timeout_secs: 30
  - name: "publish"
    run: "make publish"
default_timeout_secs: 600
"#;

    #[test]
    fn test_from_config_preserves_order() {
        let job = JobConfig::from_yaml(YAML).unwrap().to_job().unwrap();
        let names: Vec<_> = job.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["lint", "test", "publish"]);
        assert!(job.step("lint").unwrap().continue_on_error);
        assert_eq!(job.step("test").unwrap().timeout_secs, Some(30));
        assert_eq!(job.step("publish").unwrap().timeout_secs, Some(600));
    }

    #[test]
    fn test_should_run() {
        let job = JobConfig::from_yaml(YAML).unwrap().to_job().unwrap();
        assert!(job.should_run(&EventContext::new("dagger/dagger", "")));
        assert!(!job.should_run(&EventContext::new("fork/dagger", "")));
    }

    #[test]
    fn test_first_fatal_failure_and_counts() {
        let mut job = JobConfig::from_yaml(YAML).unwrap().to_job().unwrap();
        let now = Utc::now();

        job.step_mut("lint").unwrap().state = StepState::Failed {
            error: "exit 1".to_string(),
            exit_code: Some(1),
            continued: true,
            started_at: now,
            failed_at: now,
        };
        assert_eq!(job.first_fatal_failure(), None);

        job.step_mut("test").unwrap().state = StepState::Failed {
            error: "exit 2".to_string(),
            exit_code: Some(2),
            continued: false,
            started_at: now,
            failed_at: now,
        };
        assert_eq!(job.first_fatal_failure(), Some("test"));

        job.skip_remaining("step 'test' failed");
        assert!(job.is_complete());

        job.update_counts();
        assert_eq!(job.state.failed_steps, 2);
        assert_eq!(job.state.skipped_steps, 1);
        assert_eq!(job.state.total_steps, 3);
    }

    #[test]
    fn test_cancel_closes_running_step() {
        let mut job = JobConfig::from_yaml(YAML).unwrap().to_job().unwrap();
        let now = Utc::now();
        job.step_mut("lint").unwrap().state = StepState::Completed {
            exit_code: 0,
            started_at: now,
            completed_at: now,
        };
        job.step_mut("test").unwrap().state = StepState::Running { started_at: now };

        job.cancel("job cancelled");

        match &job.step("test").unwrap().state {
            StepState::Failed { error, exit_code, .. } => {
                assert_eq!(error, "job cancelled");
                assert_eq!(*exit_code, None);
            }
            other => panic!("unexpected state: {:?}", other),
        }
        assert!(matches!(
            job.step("publish").unwrap().state,
            StepState::Skipped { .. }
        ));
        assert!(job.is_complete());
        assert_eq!(job.state.status, crate::core::ExecutionStatus::Cancelled);
        assert_eq!(job.state.completed_steps, 1);
        assert_eq!(job.state.failed_steps, 1);
        assert_eq!(job.state.skipped_steps, 1);
    }
}
