//! Step domain model

use crate::core::{config::StepConfig, context::JobContext, state::StepState};
use crate::execution::CommandSpec;
use std::collections::HashMap;
use std::path::PathBuf;

/// A single step in a job
#[derive(Debug, Clone)]
pub struct Step {
    /// Step name, unique within the job
    pub name: String,

    /// Shell command template
    pub command: String,

    /// Step environment (values may reference variables)
    pub env: HashMap<String, String>,

    /// Keep going when this step fails
    pub continue_on_error: bool,

    /// Directory to run the command in
    pub working_directory: Option<PathBuf>,

    /// Timeout in seconds (None = no limit)
    pub timeout_secs: Option<u64>,

    /// Runtime state
    pub state: StepState,
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, default_timeout_secs: Option<u64>) -> Self {
        Step {
            name: config.name.clone(),
            command: config.run.clone(),
            env: config.env.clone(),
            continue_on_error: config.continue_on_error,
            working_directory: config.working_directory.as_ref().map(PathBuf::from),
            timeout_secs: config.timeout_secs.or(default_timeout_secs),
            state: StepState::Pending,
        }
    }

    /// Resolve the command and environment against a job context
    pub fn command_spec(&self, context: &JobContext, job_env: &HashMap<String, String>) -> CommandSpec {
        CommandSpec {
            step_name: self.name.clone(),
            command: context.render(&self.command),
            env: context.step_env(job_env, &self.env),
            working_directory: self
                .working_directory
                .as_ref()
                .map(|dir| PathBuf::from(context.render(&dir.to_string_lossy()))),
            timeout_secs: self.timeout_secs,
        }
    }
}
