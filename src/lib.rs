//! jobrunner - a minimal CI job runner
//!
//! A job picks its runner class from the triggering repository and event,
//! runs its steps one after another in a shell and publishes its artifacts.

pub mod artifact;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use crate::artifact::{ArtifactPublisher, ArtifactSpec, LocalArtifactStore, PublishOutcome};
pub use crate::core::{EventContext, ExecutionStatus, Job, RunnerSelector, SelectionError, Step, StepState};
pub use crate::execution::{CommandExecutor, ExecutionEngine, ExecutionError, ExecutionEvent, ShellExecutor};
