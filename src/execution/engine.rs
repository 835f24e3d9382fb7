//! Main execution engine - runs one job from runner selection to artifacts

use crate::{
    artifact::{ArtifactPublisher, ArtifactSpec, PublishOutcome},
    core::{EventContext, ExecutionStatus, Job, JobContext, SelectionError, StepState},
    execution::{CommandExecutor, JobLog, OutputSink, OutputStream},
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during job execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    JobStarted {
        execution_id: Uuid,
        job_name: String,
    },
    RunnerSelected {
        runner_class: String,
    },
    StepStarted {
        step_name: String,
        index: usize,
        total: usize,
    },
    StepOutput {
        step_name: String,
        stream: OutputStream,
        line: String,
    },
    StepCompleted {
        step_name: String,
    },
    StepFailed {
        step_name: String,
        error: String,
        continued: bool,
    },
    StepSkipped {
        step_name: String,
        reason: String,
    },
    ArtifactPublished {
        name: String,
        destination: String,
        bytes: u64,
    },
    ArtifactSkipped {
        name: String,
        reason: String,
    },
    ArtifactFailed {
        name: String,
        error: String,
        continued: bool,
    },
    JobCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

type HandlerList = RwLock<Vec<EventHandler>>;

fn emit(handlers: &HandlerList, event: ExecutionEvent) {
    let handlers = match handlers.read() {
        Ok(handlers) => handlers,
        Err(poisoned) => poisoned.into_inner(),
    };
    for handler in handlers.iter() {
        handler(event.clone());
    }
}

/// Errors that stop a job before its steps run
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Failed to create job log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Forwards command output to the job log and to event handlers
struct StepSink<'a> {
    step_name: &'a str,
    log: Option<&'a JobLog>,
    handlers: &'a HandlerList,
}

impl OutputSink for StepSink<'_> {
    fn on_line(&self, stream: OutputStream, line: &str) {
        if let Some(log) = self.log {
            log.output_line(stream, line);
        }
        emit(
            self.handlers,
            ExecutionEvent::StepOutput {
                step_name: self.step_name.to_string(),
                stream,
                line: line.to_string(),
            },
        );
    }
}

/// Main job execution engine
pub struct ExecutionEngine<E, P> {
    executor: Arc<E>,
    publisher: Arc<P>,
    event_handlers: Arc<HandlerList>,
}

impl<E: CommandExecutor, P: ArtifactPublisher> ExecutionEngine<E, P> {
    pub fn new(executor: E, publisher: P) -> Self {
        Self {
            executor: Arc::new(executor),
            publisher: Arc::new(publisher),
            event_handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        let mut handlers = match self.event_handlers.write() {
            Ok(handlers) => handlers,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.push(Arc::new(handler));
    }

    fn emit_event(&self, event: ExecutionEvent) {
        emit(&self.event_handlers, event);
    }

    /// Execute the job for an event.
    ///
    /// Returns the final status: `Completed`, `Failed` or `Skipped`. An
    /// error means the job could not start (no runner, unusable log file);
    /// the job state is marked failed in that case too.
    pub async fn execute(
        &self,
        job: &mut Job,
        event: &EventContext,
    ) -> Result<ExecutionStatus, EngineError> {
        let execution_id = job.state.execution_id;

        info!("Starting job: {} ({})", job.name, execution_id);
        self.emit_event(ExecutionEvent::JobStarted {
            execution_id,
            job_name: job.name.clone(),
        });

        if !job.should_run(event) {
            info!("Condition not met for job {}, skipping", job.name);
            job.skip_remaining("job condition not met");
            job.update_counts();
            job.state.skip();
            self.emit_event(ExecutionEvent::JobCompleted {
                execution_id,
                status: ExecutionStatus::Skipped,
            });
            return Ok(ExecutionStatus::Skipped);
        }

        let runner_class = match job.selector.select(event) {
            Ok(runner_class) => runner_class.to_string(),
            Err(e) => {
                error!("Runner selection failed for job {}: {}", job.name, e);
                self.abort(job, "no runner selected");
                return Err(e.into());
            }
        };

        info!("Job {} runs on {}", job.name, runner_class);
        job.state.start(&runner_class, job.steps.len());
        self.emit_event(ExecutionEvent::RunnerSelected {
            runner_class: runner_class.clone(),
        });

        let context = JobContext::new(&job.name, &runner_class, event, &job.variables);

        let log = match job.log_file.as_deref().map(|p| context.render(p)) {
            Some(path) => match JobLog::create(&path) {
                Ok(log) => Some(log),
                Err(source) => {
                    error!("Cannot create job log {}: {}", path, source);
                    self.abort(job, "job log unavailable");
                    return Err(EngineError::Log {
                        path: path.into(),
                        source,
                    });
                }
            },
            None => None,
        };

        for index in 0..job.steps.len() {
            if let Some(failed) = job.first_fatal_failure().map(str::to_string) {
                let reason = format!("step '{}' failed", failed);
                let step = &mut job.steps[index];
                step.state = StepState::Skipped {
                    reason: reason.clone(),
                };
                self.emit_event(ExecutionEvent::StepSkipped {
                    step_name: step.name.clone(),
                    reason,
                });
                continue;
            }

            self.execute_step(job, index, &context, log.as_ref()).await;
            job.update_counts();
        }

        if let Some(log) = &log {
            if let Err(e) = log.flush() {
                warn!("Failed to flush job log {}: {}", log.path().display(), e);
            }
        }

        // Artifacts are published whatever the step outcome
        let artifacts_ok = self.publish_artifacts(job, &context).await;

        job.update_counts();
        let status = if job.first_fatal_failure().is_none() && artifacts_ok {
            job.state.complete();
            ExecutionStatus::Completed
        } else {
            job.state.fail();
            ExecutionStatus::Failed
        };

        info!("Job execution finished: {} - {:?}", job.name, status);
        self.emit_event(ExecutionEvent::JobCompleted {
            execution_id,
            status,
        });

        Ok(status)
    }

    /// Execute a single step
    async fn execute_step(
        &self,
        job: &mut Job,
        index: usize,
        context: &JobContext,
        log: Option<&JobLog>,
    ) {
        let total = job.steps.len();
        let spec = job.steps[index].command_spec(context, &job.env);
        let continue_on_error = job.steps[index].continue_on_error;
        let started_at = Utc::now();

        job.steps[index].state = StepState::Running { started_at };
        info!("Running step {} ({}/{})", spec.step_name, index + 1, total);
        self.emit_event(ExecutionEvent::StepStarted {
            step_name: spec.step_name.clone(),
            index,
            total,
        });

        if let Some(log) = log {
            log.step_header(&spec.step_name);
        }

        let sink = StepSink {
            step_name: &spec.step_name,
            log,
            handlers: &self.event_handlers,
        };
        let result = self.executor.execute(&spec, &sink).await;

        match result {
            Ok(exit_code) => {
                info!("Step {} completed", spec.step_name);
                job.steps[index].state = StepState::Completed {
                    exit_code,
                    started_at,
                    completed_at: Utc::now(),
                };
                self.emit_event(ExecutionEvent::StepCompleted {
                    step_name: spec.step_name,
                });
            }
            Err(e) => {
                if continue_on_error {
                    warn!("Step {} failed, continuing: {}", spec.step_name, e);
                } else {
                    error!("Step {} failed: {}", spec.step_name, e);
                }
                job.steps[index].state = StepState::Failed {
                    error: e.to_string(),
                    exit_code: e.exit_code(),
                    continued: continue_on_error,
                    started_at,
                    failed_at: Utc::now(),
                };
                self.emit_event(ExecutionEvent::StepFailed {
                    step_name: spec.step_name,
                    error: e.to_string(),
                    continued: continue_on_error,
                });
            }
        }
    }

    /// Publish every artifact; false when a non-tolerated failure occurred
    async fn publish_artifacts(&self, job: &Job, context: &JobContext) -> bool {
        let mut all_ok = true;

        for artifact in &job.artifacts {
            let rendered = ArtifactSpec {
                path: PathBuf::from(context.render(&artifact.path.to_string_lossy())),
                ..artifact.clone()
            };

            match self.publisher.publish(&rendered, job.state.execution_id).await {
                Ok(PublishOutcome::Published { destination, bytes }) => {
                    self.emit_event(ExecutionEvent::ArtifactPublished {
                        name: rendered.name.clone(),
                        destination,
                        bytes,
                    });
                }
                Ok(PublishOutcome::Missing { path }) => {
                    let reason = format!("{} does not exist", path.display());
                    if rendered.continue_on_error {
                        warn!("No file for artifact '{}': {}", rendered.name, reason);
                        self.emit_event(ExecutionEvent::ArtifactSkipped {
                            name: rendered.name.clone(),
                            reason,
                        });
                    } else {
                        error!("No file for artifact '{}': {}", rendered.name, reason);
                        all_ok = false;
                        self.emit_event(ExecutionEvent::ArtifactFailed {
                            name: rendered.name.clone(),
                            error: reason,
                            continued: false,
                        });
                    }
                }
                Err(e) => {
                    if rendered.continue_on_error {
                        warn!("{}", e);
                    } else {
                        error!("{}", e);
                        all_ok = false;
                    }
                    self.emit_event(ExecutionEvent::ArtifactFailed {
                        name: rendered.name.clone(),
                        error: e.to_string(),
                        continued: rendered.continue_on_error,
                    });
                }
            }
        }

        all_ok
    }

    /// Fail a job that could not start
    fn abort(&self, job: &mut Job, reason: &str) {
        job.skip_remaining(reason);
        job.update_counts();
        job.state.fail();
        self.emit_event(ExecutionEvent::JobCompleted {
            execution_id: job.state.execution_id,
            status: ExecutionStatus::Failed,
        });
    }
}
