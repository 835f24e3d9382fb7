//! Artifact publishing
//!
//! Artifacts are published once a job finishes, whether it succeeded or
//! failed. A missing file is reported as [`PublishOutcome::Missing`] rather
//! than an error so callers can honour `continue_on_error`.

pub mod local;

pub use local::{InMemoryArtifactStore, LocalArtifactStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Characters an artifact name may not contain
pub const INVALID_ARTIFACT_NAME_CHARS: &[char] = &['\\', '/', '"', ':', '<', '>', '|', '*', '?'];

/// A file to publish under a destination name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Destination name
    pub name: String,

    /// Local file path
    pub path: PathBuf,

    /// Whether a missing file or failed upload is tolerated
    pub continue_on_error: bool,
}

/// Result of a publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { destination: String, bytes: u64 },
    Missing { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact name is not valid: '{0}'. It cannot be blank or contain '\\', '/', '\"', ':', '<', '>', '|', '*', or '?'")]
    InvalidName(String),

    #[error("Artifact path '{0}' is not a regular file")]
    NotAFile(PathBuf),

    #[error("Failed to upload artifact '{name}': {source}")]
    Upload {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Check an artifact name for characters the store cannot accept
pub fn validate_name(name: &str) -> Result<(), ArtifactError> {
    if name.trim().is_empty() || name.contains(INVALID_ARTIFACT_NAME_CHARS) {
        return Err(ArtifactError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Destination for job artifacts
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Publish one file; `Missing` when the file does not exist
    async fn publish(
        &self,
        artifact: &ArtifactSpec,
        execution_id: Uuid,
    ) -> Result<PublishOutcome, ArtifactError>;
}
