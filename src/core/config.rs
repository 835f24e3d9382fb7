//! Job configuration from YAML

use crate::artifact::{self, ArtifactSpec};
use crate::core::{
    context::referenced_variables,
    selector::{EventFilter, Predicate, RepositoryMatch, RunnerRule, RunnerSelector},
    Job,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Top-level job configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name
    pub name: String,

    /// Condition under which the job runs at all
    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<PredicateConfig>,

    /// Ordered, mutually exclusive runner rules
    #[serde(default)]
    pub runners: Vec<RunnerRuleConfig>,

    /// Variables available as `{{ name }}` in commands and env values
    #[serde(default)]
    variables: HashMap<String, Value>,

    /// Environment shared by all steps
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Steps, run in declaration order
    pub steps: Vec<StepConfig>,

    /// Files published after the last step
    #[serde(default)]
    pub artifacts: Vec<ArtifactConfig>,

    /// File that collects the output of every step
    #[serde(default)]
    pub log_file: Option<String>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
}

/// Predicate over repository identity and event kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredicateConfig {
    /// Repository must equal this name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Repository must differ from this name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_not: Option<String>,

    /// `push`, `pull_request` or `any`
    #[serde(default)]
    pub event: EventFilter,
}

/// Runner rule as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerRuleConfig {
    pub runner_class: String,

    #[serde(default)]
    pub when: PredicateConfig,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step name, unique within the job
    pub name: String,

    /// Shell command
    #[serde(alias = "command")]
    pub run: String,

    /// Step environment
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Whether the job continues when this step fails
    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default)]
    pub working_directory: Option<String>,

    /// Timeout for this step (overrides the job default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Artifact configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Destination name
    pub name: String,

    /// Local file path
    pub path: String,

    /// Missing files and failed uploads do not fail the job
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,
}

fn default_continue_on_error() -> bool {
    true
}

impl PredicateConfig {
    /// Convert to a domain predicate
    pub fn to_predicate(&self) -> Result<Predicate> {
        let repository = match (&self.repository, &self.repository_not) {
            (Some(_), Some(_)) => {
                anyhow::bail!("A predicate cannot set both 'repository' and 'repository_not'")
            }
            (Some(name), None) => RepositoryMatch::Is(non_blank(name, "repository")?),
            (None, Some(name)) => RepositoryMatch::IsNot(non_blank(name, "repository_not")?),
            (None, None) => RepositoryMatch::Any,
        };

        Ok(Predicate {
            repository,
            event: self.event,
        })
    }
}

fn non_blank(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        anyhow::bail!("'{}' must not be empty", field);
    }
    Ok(trimmed.to_string())
}

impl JobConfig {
    /// Load job configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse job configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: JobConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the job configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Job name must not be empty");
        }

        if self.steps.is_empty() {
            anyhow::bail!("Job '{}' has no steps", self.name);
        }

        let mut seen_steps = HashSet::new();
        for step in &self.steps {
            if !seen_steps.insert(&step.name) {
                anyhow::bail!("Duplicate step name: {}", step.name);
            }
            if step.run.trim().is_empty() {
                anyhow::bail!("Step '{}' has an empty command", step.name);
            }
        }

        if let Some(condition) = &self.condition {
            condition
                .to_predicate()
                .with_context(|| format!("Invalid condition on job '{}'", self.name))?;
        }

        self.selector()?;

        let mut seen_artifacts = HashSet::new();
        for artifact in &self.artifacts {
            artifact::validate_name(&artifact.name)?;
            if !seen_artifacts.insert(&artifact.name) {
                anyhow::bail!("Duplicate artifact name: {}", artifact.name);
            }
            if artifact.path.trim().is_empty() {
                anyhow::bail!("Artifact '{}' has an empty path", artifact.name);
            }
        }

        for (name, value) in &self.variables {
            if matches!(value, Value::Mapping(_) | Value::Sequence(_) | Value::Tagged(_)) {
                anyhow::bail!("Variable '{}' must be a string, number or boolean", name);
            }
        }

        Ok(())
    }

    /// Build the runner selector (catch-all when no rules are declared)
    pub fn selector(&self) -> Result<RunnerSelector> {
        if self.runners.is_empty() {
            return Ok(RunnerSelector::default());
        }

        let rules = self
            .runners
            .iter()
            .map(|rule| {
                let when = rule.when.to_predicate().with_context(|| {
                    format!("Invalid predicate for runner '{}'", rule.runner_class)
                })?;
                Ok(RunnerRule::new(non_blank(&rule.runner_class, "runner_class")?, when))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RunnerSelector::new(rules)?)
    }

    /// Variables as plain strings
    pub fn variables(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Null => String::new(),
                    other => serde_yaml::to_string(other)
                        .unwrap_or_default()
                        .trim_end()
                        .to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }

    /// Placeholders referenced by commands, env values or paths that are
    /// neither declared variables nor built-ins
    pub fn undeclared_variables(&self) -> Vec<String> {
        let declared = self.variables();
        let builtins = ["job", "runner_class", "repository", "base_ref"];

        let templates = self
            .steps
            .iter()
            .flat_map(|s| {
                std::iter::once(s.run.as_str())
                    .chain(s.env.values().map(String::as_str))
                    .chain(s.working_directory.as_deref())
            })
            .chain(self.env.values().map(String::as_str))
            .chain(self.artifacts.iter().map(|a| a.path.as_str()))
            .chain(self.log_file.as_deref());

        let mut missing: Vec<String> = templates
            .flat_map(referenced_variables)
            .filter(|name| !declared.contains_key(name) && !builtins.contains(&name.as_str()))
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Artifacts as domain specs (paths unrendered)
    pub fn artifact_specs(&self) -> Vec<ArtifactSpec> {
        self.artifacts
            .iter()
            .map(|a| ArtifactSpec {
                name: a.name.clone(),
                path: a.path.clone().into(),
                continue_on_error: a.continue_on_error,
            })
            .collect()
    }

    /// Convert config to a Job domain model
    pub fn to_job(&self) -> Result<Job> {
        Job::from_config(self)
    }
}
