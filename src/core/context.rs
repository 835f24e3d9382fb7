//! Job context - variables, built-ins and command rendering

use crate::core::selector::EventContext;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::warn;

/// Environment variable names exported to every step
pub const ENV_RUNNER_CLASS: &str = "JOBRUNNER_RUNNER_CLASS";
pub const ENV_REPOSITORY: &str = "JOBRUNNER_REPOSITORY";
pub const ENV_BASE_REF: &str = "JOBRUNNER_BASE_REF";
pub const ENV_JOB: &str = "JOBRUNNER_JOB";

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Runtime data available while a job executes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobContext {
    /// Job name
    pub job_name: String,

    /// Selected runner class
    pub runner_class: String,

    /// Triggering event
    pub event: EventContext,

    /// Job variables (after CLI overrides)
    pub variables: HashMap<String, String>,
}

impl JobContext {
    pub fn new(
        job_name: &str,
        runner_class: &str,
        event: &EventContext,
        variables: &HashMap<String, String>,
    ) -> Self {
        Self {
            job_name: job_name.to_string(),
            runner_class: runner_class.to_string(),
            event: event.clone(),
            variables: variables.clone(),
        }
    }

    /// All variables available for rendering, built-ins included
    pub fn rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = self.variables.clone();
        vars.insert("job".to_string(), self.job_name.clone());
        vars.insert("runner_class".to_string(), self.runner_class.clone());
        vars.insert("repository".to_string(), self.event.repository.clone());
        vars.insert("base_ref".to_string(), self.event.base_ref.clone());
        vars
    }

    /// Replace `{{ name }}` placeholders; unknown names are left as written
    pub fn render(&self, template: &str) -> String {
        let vars = self.rendering_variables();
        placeholder_regex()
            .replace_all(template, |caps: &regex::Captures<'_>| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    warn!("Unknown variable '{}' left unexpanded", &caps[1]);
                    caps[0].to_string()
                }
            })
            .into_owned()
    }

    /// Environment for a step: built-ins, then job env, then step env
    pub fn step_env(
        &self,
        job_env: &HashMap<String, String>,
        step_env: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert(ENV_JOB.to_string(), self.job_name.clone());
        env.insert(ENV_RUNNER_CLASS.to_string(), self.runner_class.clone());
        env.insert(ENV_REPOSITORY.to_string(), self.event.repository.clone());
        env.insert(ENV_BASE_REF.to_string(), self.event.base_ref.clone());

        for (key, value) in job_env.iter().chain(step_env.iter()) {
            env.insert(key.clone(), self.render(value));
        }

        env
    }
}

/// Names of all placeholders referenced by a template
pub fn referenced_variables(template: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}
