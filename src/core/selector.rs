//! Runner selection - maps (repository, event kind) to a runner class

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of event that triggered a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Push or any other non pull-request trigger
    Push,
    /// Pull request targeting a base ref
    PullRequest,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Push => write!(f, "push"),
            EventKind::PullRequest => write!(f, "pull_request"),
        }
    }
}

/// The triggering event as seen by the selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    /// Repository identity, e.g. `dagger/dagger`
    pub repository: String,

    /// Pull request base ref (empty when not a pull request)
    pub base_ref: String,
}

impl EventContext {
    pub fn new(repository: impl Into<String>, base_ref: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            base_ref: base_ref.into(),
        }
    }

    /// Event kind derived from the base ref
    pub fn kind(&self) -> EventKind {
        if self.base_ref.trim().is_empty() {
            EventKind::Push
        } else {
            EventKind::PullRequest
        }
    }
}

/// Repository half of a predicate. Comparison is ASCII case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryMatch {
    Any,
    Is(String),
    IsNot(String),
}

impl RepositoryMatch {
    pub fn matches(&self, repository: &str) -> bool {
        match self {
            RepositoryMatch::Any => true,
            RepositoryMatch::Is(name) => name.eq_ignore_ascii_case(repository),
            RepositoryMatch::IsNot(name) => !name.eq_ignore_ascii_case(repository),
        }
    }

    /// Whether some repository satisfies both matches
    fn intersects(&self, other: &RepositoryMatch) -> bool {
        use RepositoryMatch::*;
        match (self, other) {
            (Any, _) | (_, Any) => true,
            (Is(a), Is(b)) => a.eq_ignore_ascii_case(b),
            (Is(a), IsNot(b)) | (IsNot(b), Is(a)) => !a.eq_ignore_ascii_case(b),
            (IsNot(_), IsNot(_)) => true,
        }
    }
}

/// Event half of a predicate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFilter {
    #[default]
    Any,
    Push,
    PullRequest,
}

impl EventFilter {
    pub fn matches(&self, kind: EventKind) -> bool {
        match self {
            EventFilter::Any => true,
            EventFilter::Push => kind == EventKind::Push,
            EventFilter::PullRequest => kind == EventKind::PullRequest,
        }
    }

    fn intersects(&self, other: &EventFilter) -> bool {
        match (self, other) {
            (EventFilter::Any, _) | (_, EventFilter::Any) => true,
            (a, b) => a == b,
        }
    }
}

/// Conjunction of a repository match and an event filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub repository: RepositoryMatch,
    pub event: EventFilter,
}

impl Predicate {
    /// Predicate that holds for every event
    pub fn always() -> Self {
        Self {
            repository: RepositoryMatch::Any,
            event: EventFilter::Any,
        }
    }

    pub fn matches(&self, event: &EventContext) -> bool {
        self.repository.matches(&event.repository) && self.event.matches(event.kind())
    }

    /// Whether some (repository, base_ref) pair satisfies both predicates
    pub fn overlaps(&self, other: &Predicate) -> bool {
        self.repository.intersects(&other.repository) && self.event.intersects(&other.event)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repo = match &self.repository {
            RepositoryMatch::Any => None,
            RepositoryMatch::Is(name) => Some(format!("repository == {}", name)),
            RepositoryMatch::IsNot(name) => Some(format!("repository != {}", name)),
        };
        let event = match self.event {
            EventFilter::Any => None,
            EventFilter::Push => Some("push".to_string()),
            EventFilter::PullRequest => Some("pull_request".to_string()),
        };
        match (repo, event) {
            (None, None) => write!(f, "always"),
            (Some(r), None) => write!(f, "{}", r),
            (None, Some(e)) => write!(f, "{}", e),
            (Some(r), Some(e)) => write!(f, "{} && {}", r, e),
        }
    }
}

/// A single selection rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerRule {
    pub runner_class: String,
    pub when: Predicate,
}

impl RunnerRule {
    pub fn new(runner_class: impl Into<String>, when: Predicate) -> Self {
        Self {
            runner_class: runner_class.into(),
            when,
        }
    }
}

/// Errors raised while building a selector or selecting a runner
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("No runner matches repository '{repository}' on {kind}")]
    NoMatchingRunner { repository: String, kind: EventKind },

    #[error("Runner rules '{first}' ({first_when}) and '{second}' ({second_when}) overlap")]
    OverlappingRules {
        first: String,
        first_when: String,
        second: String,
        second_when: String,
    },

    #[error("At least one runner rule is required")]
    NoRules,
}

/// Name of the runner class used when a job declares no rules
pub const DEFAULT_RUNNER_CLASS: &str = "local";

/// Ordered, mutually exclusive set of runner rules
#[derive(Debug, Clone)]
pub struct RunnerSelector {
    rules: Vec<RunnerRule>,
}

impl RunnerSelector {
    /// Build a selector, rejecting empty or overlapping rule sets
    pub fn new(rules: Vec<RunnerRule>) -> Result<Self, SelectionError> {
        if rules.is_empty() {
            return Err(SelectionError::NoRules);
        }
        Self::check_exclusive(&rules)?;
        Ok(Self { rules })
    }

    /// Selector with a single rule that always matches
    pub fn catch_all(runner_class: impl Into<String>) -> Self {
        Self {
            rules: vec![RunnerRule::new(runner_class, Predicate::always())],
        }
    }

    pub fn rules(&self) -> &[RunnerRule] {
        &self.rules
    }

    /// Return the runner class of the first matching rule
    pub fn select(&self, event: &EventContext) -> Result<&str, SelectionError> {
        self.rules
            .iter()
            .find(|rule| rule.when.matches(event))
            .map(|rule| rule.runner_class.as_str())
            .ok_or_else(|| SelectionError::NoMatchingRunner {
                repository: event.repository.clone(),
                kind: event.kind(),
            })
    }

    /// All rules that match an event
    pub fn matching(&self, event: &EventContext) -> Vec<&RunnerRule> {
        self.rules.iter().filter(|rule| rule.when.matches(event)).collect()
    }

    /// Fail on the first pair of rules whose predicates can hold together
    pub fn check_exclusive(rules: &[RunnerRule]) -> Result<(), SelectionError> {
        for (i, first) in rules.iter().enumerate() {
            for second in &rules[i + 1..] {
                if first.when.overlaps(&second.when) {
                    return Err(SelectionError::OverlappingRules {
                        first: first.runner_class.clone(),
                        first_when: first.when.to_string(),
                        second: second.runner_class.clone(),
                        second_when: second.when.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for RunnerSelector {
    fn default() -> Self {
        Self::catch_all(DEFAULT_RUNNER_CLASS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dagger_rules() -> Vec<RunnerRule> {
        vec![
            RunnerRule::new(
                "dagger-runner",
                Predicate {
                    repository: RepositoryMatch::Is("dagger/dagger".to_string()),
                    event: EventFilter::Push,
                },
            ),
            RunnerRule::new(
                "dagger-runner-pr",
                Predicate {
                    repository: RepositoryMatch::Is("dagger/dagger".to_string()),
                    event: EventFilter::PullRequest,
                },
            ),
            RunnerRule::new(
                "ubuntu-latest",
                Predicate {
                    repository: RepositoryMatch::IsNot("dagger/dagger".to_string()),
                    event: EventFilter::Any,
                },
            ),
        ]
    }

    #[test]
    fn test_event_kind_from_base_ref() {
        assert_eq!(EventContext::new("a/b", "").kind(), EventKind::Push);
        assert_eq!(EventContext::new("a/b", "  ").kind(), EventKind::Push);
        assert_eq!(EventContext::new("a/b", "main").kind(), EventKind::PullRequest);
    }

    #[test]
    fn test_select_each_partition() {
        let selector = RunnerSelector::new(dagger_rules()).unwrap();

        assert_eq!(
            selector.select(&EventContext::new("dagger/dagger", "")).unwrap(),
            "dagger-runner"
        );
        assert_eq!(
            selector.select(&EventContext::new("dagger/dagger", "main")).unwrap(),
            "dagger-runner-pr"
        );
        assert_eq!(
            selector.select(&EventContext::new("someone/fork", "main")).unwrap(),
            "ubuntu-latest"
        );
        assert_eq!(
            selector.select(&EventContext::new("someone/fork", "")).unwrap(),
            "ubuntu-latest"
        );
    }

    #[test]
    fn test_repository_match_ignores_case() {
        let selector = RunnerSelector::new(dagger_rules()).unwrap();
        assert_eq!(
            selector.select(&EventContext::new("Dagger/Dagger", "")).unwrap(),
            "dagger-runner"
        );
    }

    #[test]
    fn test_no_matching_runner() {
        let rules = vec![RunnerRule::new(
            "internal",
            Predicate {
                repository: RepositoryMatch::Is("dagger/dagger".to_string()),
                event: EventFilter::Any,
            },
        )];
        let selector = RunnerSelector::new(rules).unwrap();

        let err = selector.select(&EventContext::new("other/repo", "")).unwrap_err();
        assert_eq!(
            err,
            SelectionError::NoMatchingRunner {
                repository: "other/repo".to_string(),
                kind: EventKind::Push,
            }
        );
    }

    #[test]
    fn test_overlapping_rules_rejected() {
        let rules = vec![
            RunnerRule::new(
                "a",
                Predicate {
                    repository: RepositoryMatch::Is("dagger/dagger".to_string()),
                    event: EventFilter::Any,
                },
            ),
            RunnerRule::new(
                "b",
                Predicate {
                    repository: RepositoryMatch::Any,
                    event: EventFilter::PullRequest,
                },
            ),
        ];

        let err = RunnerSelector::new(rules).unwrap_err();
        assert!(matches!(err, SelectionError::OverlappingRules { .. }));
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn test_disjoint_repositories_do_not_overlap() {
        let is_a = Predicate {
            repository: RepositoryMatch::Is("a/a".to_string()),
            event: EventFilter::Any,
        };
        let is_b = Predicate {
            repository: RepositoryMatch::Is("b/b".to_string()),
            event: EventFilter::Any,
        };
        let not_a = Predicate {
            repository: RepositoryMatch::IsNot("a/a".to_string()),
            event: EventFilter::Any,
        };

        assert!(!is_a.overlaps(&is_b));
        assert!(!is_a.overlaps(&not_a));
        assert!(is_b.overlaps(&not_a));
    }

    #[test]
    fn test_empty_rules_rejected() {
        assert_eq!(RunnerSelector::new(vec![]).unwrap_err(), SelectionError::NoRules);
    }

    #[test]
    fn test_predicate_display() {
        let p = Predicate {
            repository: RepositoryMatch::IsNot("dagger/dagger".to_string()),
            event: EventFilter::PullRequest,
        };
        assert_eq!(p.to_string(), "repository != dagger/dagger && pull_request");
        assert_eq!(Predicate::always().to_string(), "always");
    }
}
