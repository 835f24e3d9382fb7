//! Command executor - the seam between the engine and external processes

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// A fully rendered command ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Step the command belongs to
    pub step_name: String,

    /// Command line, run through the platform shell
    pub command: String,

    /// Environment added on top of the inherited one
    pub env: HashMap<String, String>,

    pub working_directory: Option<PathBuf>,

    pub timeout_secs: Option<u64>,
}

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives command output line by line
pub trait OutputSink: Send + Sync {
    fn on_line(&self, stream: OutputStream, line: &str);
}

/// Sink that drops everything
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl OutputSink for NoopSink {
    fn on_line(&self, _stream: OutputStream, _line: &str) {}
}

/// Error types for command execution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Command exited with code {0}")]
    ExecutionFailed(i32),

    #[error("Failed to start command: {0}")]
    Spawn(String),

    #[error("Command was terminated by a signal")]
    Terminated,

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    #[error("I/O error while running command: {0}")]
    Io(String),
}

impl ExecutionError {
    /// Exit code, when the process exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionError::ExecutionFailed(code) => Some(*code),
            _ => None,
        }
    }
}

/// Runs a single command; `Ok` carries the (zero) exit code
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        spec: &CommandSpec,
        sink: &dyn OutputSink,
    ) -> Result<i32, ExecutionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code() {
        assert_eq!(ExecutionError::ExecutionFailed(3).exit_code(), Some(3));
        assert_eq!(ExecutionError::Terminated.exit_code(), None);
        assert_eq!(ExecutionError::Timeout(5).exit_code(), None);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ExecutionError::ExecutionFailed(2).to_string(),
            "Command exited with code 2"
        );
        assert_eq!(
            ExecutionError::Timeout(30).to_string(),
            "Command timed out after 30 seconds"
        );
    }
}
