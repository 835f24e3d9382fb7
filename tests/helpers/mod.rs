//! Test utilities for jobrunner integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use jobrunner::artifact::InMemoryArtifactStore;
use jobrunner::core::config::JobConfig;
use jobrunner::core::{EventContext, ExecutionStatus, Job, StepState};
use jobrunner::execution::{
    CommandExecutor, CommandSpec, EngineError, ExecutionEngine, ExecutionError, ExecutionEvent,
    OutputSink, OutputStream,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Executor that pretends to run commands, failing the ones it was told to
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    exit_codes: HashMap<String, i32>,
    output: HashMap<String, Vec<String>>,
    ran: Arc<Mutex<Vec<CommandSpec>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command` exit with `code`
    pub fn exits(mut self, command: &str, code: i32) -> Self {
        self.exit_codes.insert(command.to_string(), code);
        self
    }

    /// Make `command` print `lines` on stdout
    pub fn prints(mut self, command: &str, lines: &[&str]) -> Self {
        self.output.insert(
            command.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    /// Commands in the order they ran
    pub fn commands(&self) -> Vec<String> {
        self.specs().into_iter().map(|s| s.command).collect()
    }

    pub fn specs(&self) -> Vec<CommandSpec> {
        self.ran.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        spec: &CommandSpec,
        sink: &dyn OutputSink,
    ) -> Result<i32, ExecutionError> {
        self.ran.lock().unwrap().push(spec.clone());

        for line in self.output.get(&spec.command).into_iter().flatten() {
            sink.on_line(OutputStream::Stdout, line);
        }

        match self.exit_codes.get(&spec.command).copied().unwrap_or(0) {
            0 => Ok(0),
            code => Err(ExecutionError::ExecutionFailed(code)),
        }
    }
}

/// Outcome of a scripted run
pub struct RunResult {
    pub job: Job,
    pub status: Result<ExecutionStatus, EngineError>,
    pub events: Vec<ExecutionEvent>,
    pub commands: Vec<String>,
}

/// Parse and validate a job from YAML
pub fn job_from_yaml(yaml: &str) -> Job {
    JobConfig::from_yaml(yaml)
        .expect("job config should be valid")
        .to_job()
        .expect("job should build")
}

/// Run a job with a scripted executor and an in-memory artifact store
pub async fn run_job_with_script(
    mut job: Job,
    event: EventContext,
    executor: ScriptedExecutor,
) -> RunResult {
    let engine = ExecutionEngine::new(executor.clone(), InMemoryArtifactStore::new());

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let status = engine.execute(&mut job, &event).await;
    let events = events.lock().unwrap().clone();

    RunResult {
        job,
        status,
        events,
        commands: executor.commands(),
    }
}

/// A push to `repository`
pub fn push(repository: &str) -> EventContext {
    EventContext::new(repository, "")
}

/// A pull request against `base_ref` in `repository`
pub fn pull_request(repository: &str, base_ref: &str) -> EventContext {
    EventContext::new(repository, base_ref)
}

fn step_state<'a>(result: &'a RunResult, step_name: &str) -> &'a StepState {
    &result
        .job
        .step(step_name)
        .unwrap_or_else(|| panic!("step '{}' not in job", step_name))
        .state
}

pub fn assert_job_completed(result: &RunResult) {
    match &result.status {
        Ok(ExecutionStatus::Completed) => {}
        other => panic!("expected job to complete, got {:?}", other),
    }
    assert_eq!(result.job.state.status, ExecutionStatus::Completed);
}

pub fn assert_job_failed(result: &RunResult) {
    match &result.status {
        Ok(ExecutionStatus::Failed) => {}
        other => panic!("expected job to fail, got {:?}", other),
    }
    assert_eq!(result.job.state.status, ExecutionStatus::Failed);
}

pub fn assert_step_completed(result: &RunResult, step_name: &str) {
    match step_state(result, step_name) {
        StepState::Completed { exit_code, .. } => assert_eq!(*exit_code, 0),
        other => panic!("expected step '{}' to complete, got {:?}", step_name, other),
    }
}

pub fn assert_step_failed(result: &RunResult, step_name: &str, expected_code: i32) {
    match step_state(result, step_name) {
        StepState::Failed { exit_code, .. } => assert_eq!(*exit_code, Some(expected_code)),
        other => panic!("expected step '{}' to fail, got {:?}", step_name, other),
    }
}

pub fn assert_step_skipped(result: &RunResult, step_name: &str) {
    match step_state(result, step_name) {
        StepState::Skipped { .. } => {}
        other => panic!("expected step '{}' to be skipped, got {:?}", step_name, other),
    }
}

pub fn assert_commands(result: &RunResult, expected: &[&str]) {
    assert_eq!(result.commands, expected, "commands ran in unexpected order");
}

/// Names of artifacts the run published
pub fn published_artifacts(result: &RunResult) -> Vec<String> {
    result
        .events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::ArtifactPublished { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// Names of artifacts the run skipped because their file was missing
pub fn skipped_artifacts(result: &RunResult) -> Vec<String> {
    result
        .events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::ArtifactSkipped { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}
