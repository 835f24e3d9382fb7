//! Shell process executor - runs commands as child processes

use crate::execution::executor::{CommandExecutor, CommandSpec, ExecutionError, OutputSink, OutputStream};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How long to keep reading output after the shell has exited
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Executes commands through the platform shell
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    shell_args: Vec<String>,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        if cfg!(windows) {
            Self::with_shell("cmd", &["/C"])
        } else {
            Self::with_shell("sh", &["-c"])
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific shell, e.g. `("bash", &["-eo", "pipefail", "-c"])`
    pub fn with_shell(shell: &str, args: &[&str]) -> Self {
        Self {
            shell: shell.to_string(),
            shell_args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn command(&self, spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.args(&self.shell_args)
            .arg(&spec.command)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !spec.env.contains_key("CI") {
            cmd.env("CI", "true");
        }

        if let Some(dir) = &spec.working_directory {
            cmd.current_dir(dir);
        }

        cmd
    }
}

fn forward_lines<R>(reader: R, stream: OutputStream, tx: mpsc::UnboundedSender<(OutputStream, String)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopped reading {:?}: {}", stream, e);
                    break;
                }
            }
        }
    });
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(
        &self,
        spec: &CommandSpec,
        sink: &dyn OutputSink,
    ) -> Result<i32, ExecutionError> {
        debug!("Spawning {} for step {}", self.shell, spec.step_name);

        let mut child = self
            .command(spec)
            .spawn()
            .map_err(|e| ExecutionError::Spawn(format!("{}: {}", self.shell, e)))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, OutputStream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, OutputStream::Stderr, tx.clone());
        }
        drop(tx);

        // The step ends when the shell exits, even if a background process
        // it started still holds the pipes open
        let run = async {
            let status = loop {
                tokio::select! {
                    Some((stream, line)) = rx.recv() => sink.on_line(stream, &line),
                    status = child.wait() => break status,
                }
            };

            let drain = async {
                while let Some((stream, line)) = rx.recv().await {
                    sink.on_line(stream, &line);
                }
            };
            if tokio::time::timeout(OUTPUT_DRAIN_GRACE, drain).await.is_err() {
                debug!(
                    "Output of step {} still open after exit, not waiting for it",
                    spec.step_name
                );
            }

            status
        };

        let status = match spec.timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), run).await {
                Ok(status) => status,
                Err(_) => {
                    warn!("Step {} timed out after {}s, killing process", spec.step_name, secs);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill timed out process: {}", e);
                    }
                    return Err(ExecutionError::Timeout(secs));
                }
            },
            None => run.await,
        }
        .map_err(|e| ExecutionError::Io(e.to_string()))?;

        match status.code() {
            Some(0) => Ok(0),
            Some(code) => {
                debug!("Step {} exited with code {}", spec.step_name, code);
                Err(ExecutionError::ExecutionFailed(code))
            }
            None => Err(ExecutionError::Terminated),
        }
    }
}
