//! Runner selection across the repository/event domain

mod helpers;

use helpers::*;
use jobrunner::core::config::JobConfig;
use jobrunner::core::{EventContext, EventKind, SelectionError, ENV_BASE_REF, ENV_RUNNER_CLASS};

const DAGGER_RUNNERS: &str = r#"
name: "engine"
runners:
  - runner_class: "dagger-g3-v0-13-2-4c"
    when:
      repository: "dagger/dagger"
      event: push
  - runner_class: "dagger-g3-v0-13-2-4c-pr"
    when:
      repository: "dagger/dagger"
      event: pull_request
  - runner_class: "ubuntu-latest"
    when:
      repository_not: "dagger/dagger"
steps:
  - name: "test"
    run: "go test ./..."
"#;

fn domain() -> Vec<EventContext> {
    let mut events = Vec::new();
    for repository in ["dagger/dagger", "someone/fork"] {
        for base_ref in ["", "main"] {
            events.push(EventContext::new(repository, base_ref));
        }
    }
    events
}

#[test]
fn test_exactly_one_rule_matches_each_event() {
    let selector = JobConfig::from_yaml(DAGGER_RUNNERS)
        .unwrap()
        .selector()
        .unwrap();

    for event in domain() {
        let matching = selector.matching(&event);
        assert_eq!(
            matching.len(),
            1,
            "expected exactly one rule for {} / '{}', got {:?}",
            event.repository,
            event.base_ref,
            matching
        );
    }
}

#[test]
fn test_selected_runner_class_per_event() {
    let selector = JobConfig::from_yaml(DAGGER_RUNNERS)
        .unwrap()
        .selector()
        .unwrap();

    assert_eq!(selector.select(&push("dagger/dagger")).unwrap(), "dagger-g3-v0-13-2-4c");
    assert_eq!(
        selector.select(&pull_request("dagger/dagger", "main")).unwrap(),
        "dagger-g3-v0-13-2-4c-pr"
    );
    assert_eq!(selector.select(&push("someone/fork")).unwrap(), "ubuntu-latest");
    assert_eq!(
        selector.select(&pull_request("someone/fork", "main")).unwrap(),
        "ubuntu-latest"
    );
}

#[test]
fn test_whitespace_base_ref_is_a_push() {
    let event = EventContext::new("dagger/dagger", "   ");
    assert_eq!(event.kind(), EventKind::Push);
}

#[test]
fn test_overlapping_rules_rejected_at_load() {
    let yaml = r#"
name: "engine"
runners:
  - runner_class: "big"
    when:
      repository: "dagger/dagger"
  - runner_class: "pr"
    when:
      event: pull_request
steps:
  - name: "test"
    run: "go test ./..."
"#;

    let err = JobConfig::from_yaml(yaml).unwrap_err();
    let selection = err
        .downcast_ref::<SelectionError>()
        .expect("overlap should surface as a selection error");
    assert!(matches!(selection, SelectionError::OverlappingRules { .. }));
}

#[tokio::test]
async fn test_no_matching_runner_fails_without_running_steps() {
    let yaml = r#"
name: "engine"
runners:
  - runner_class: "dagger-runner"
    when:
      repository: "dagger/dagger"
steps:
  - name: "test"
    run: "go test ./..."
"#;

    let result = run_job_with_script(
        job_from_yaml(yaml),
        push("someone/fork"),
        ScriptedExecutor::new(),
    )
    .await;

    match &result.status {
        Err(jobrunner::execution::EngineError::Selection(SelectionError::NoMatchingRunner {
            repository,
            kind,
        })) => {
            assert_eq!(repository, "someone/fork");
            assert_eq!(*kind, EventKind::Push);
        }
        other => panic!("expected NoMatchingRunner, got {:?}", other),
    }
    assert!(result.commands.is_empty());
    assert_step_skipped(&result, "test");
    assert_eq!(result.job.state.status, jobrunner::ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_runner_class_exported_to_steps() {
    let executor = ScriptedExecutor::new();
    let result = run_job_with_script(
        job_from_yaml(DAGGER_RUNNERS),
        pull_request("dagger/dagger", "main"),
        executor.clone(),
    )
    .await;

    assert_job_completed(&result);
    assert_eq!(result.job.state.runner_class.as_deref(), Some("dagger-g3-v0-13-2-4c-pr"));

    let specs = executor.specs();
    assert_eq!(
        specs[0].env.get(ENV_RUNNER_CLASS).map(String::as_str),
        Some("dagger-g3-v0-13-2-4c-pr")
    );
    assert_eq!(specs[0].env.get(ENV_BASE_REF).map(String::as_str), Some("main"));
}
