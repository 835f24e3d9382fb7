//! Persistence layer for job run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

pub use crate::core::ExecutionStatus;
use crate::core::Job;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Summary of a job run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Job name
    pub job_name: String,

    /// Runner class the job was dispatched to (None if selection failed)
    pub runner_class: Option<String>,

    /// Execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When execution finished
    pub completed_at: Option<DateTime<Utc>>,

    pub completed_steps: usize,
    pub failed_steps: usize,
    pub total_steps: usize,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a job run
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, execution_id: Uuid) -> Result<Option<RunSummary>>;

    /// List all runs of a job, newest first
    async fn list_runs(&self, job_name: &str) -> Result<Vec<RunSummary>>;

    /// List all job names
    async fn list_jobs(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or `--no-history` runs)
pub struct InMemoryPersistence {
    runs: tokio::sync::RwLock<HashMap<Uuid, RunSummary>>,
    by_job: tokio::sync::RwLock<HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(HashMap::new()),
            by_job: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        let is_new = runs.insert(run.execution_id, run.clone()).is_none();

        if is_new {
            let mut by_job = self.by_job.write().await;
            by_job
                .entry(run.job_name.clone())
                .or_default()
                .push(run.execution_id);
        }

        Ok(())
    }

    async fn load_run(&self, execution_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&execution_id).cloned())
    }

    async fn list_runs(&self, job_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let by_job = self.by_job.read().await;

        let mut result: Vec<RunSummary> = by_job
            .get(job_name)
            .map(|ids| ids.iter().filter_map(|id| runs.get(id).cloned()).collect())
            .unwrap_or_default();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_jobs(&self) -> Result<Vec<String>> {
        let by_job = self.by_job.read().await;
        let mut names: Vec<String> = by_job.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Keep a run going when its history store cannot be opened
pub fn or_in_memory(opened: Result<Arc<dyn PersistenceBackend>>) -> Arc<dyn PersistenceBackend> {
    match opened {
        Ok(store) => store,
        Err(e) => {
            warn!("Run history unavailable, this run is kept in memory only: {:#}", e);
            Arc::new(InMemoryPersistence::new())
        }
    }
}

/// Create a summary from a job
pub fn create_summary(job: &Job) -> RunSummary {
    RunSummary {
        execution_id: job.state.execution_id,
        job_name: job.name.clone(),
        runner_class: job.state.runner_class.clone(),
        status: job.state.status,
        started_at: job.state.started_at.unwrap_or_else(Utc::now),
        completed_at: job.state.completed_at,
        completed_steps: job.state.completed_steps,
        failed_steps: job.state.failed_steps,
        total_steps: job.state.total_steps,
    }
}
