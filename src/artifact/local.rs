//! Filesystem and in-memory artifact stores

use crate::artifact::{ArtifactError, ArtifactPublisher, ArtifactSpec, PublishOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Copies artifacts into `<root>/<execution id>/<name>/<file name>`
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the platform's local data directory
    pub fn with_default_path() -> Self {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(data_dir.join("jobrunner").join("artifacts"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn destination(&self, artifact: &ArtifactSpec, execution_id: Uuid) -> PathBuf {
        let file_name = artifact
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| artifact.name.clone().into());
        self.root
            .join(execution_id.to_string())
            .join(&artifact.name)
            .join(file_name)
    }
}

#[async_trait]
impl ArtifactPublisher for LocalArtifactStore {
    async fn publish(
        &self,
        artifact: &ArtifactSpec,
        execution_id: Uuid,
    ) -> Result<PublishOutcome, ArtifactError> {
        match tokio::fs::try_exists(&artifact.path).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Artifact '{}' not found at {}", artifact.name, artifact.path.display());
                return Ok(PublishOutcome::Missing {
                    path: artifact.path.clone(),
                });
            }
            Err(source) => return Err(upload_error(artifact, source)),
        }

        let metadata = tokio::fs::metadata(&artifact.path)
            .await
            .map_err(|source| upload_error(artifact, source))?;
        if !metadata.is_file() {
            return Err(ArtifactError::NotAFile(artifact.path.clone()));
        }

        let destination = self.destination(artifact, execution_id);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| upload_error(artifact, source))?;
        }

        let bytes = tokio::fs::copy(&artifact.path, &destination)
            .await
            .map_err(|source| upload_error(artifact, source))?;

        info!(
            "Published artifact '{}' ({} bytes) to {}",
            artifact.name,
            bytes,
            destination.display()
        );

        Ok(PublishOutcome::Published {
            destination: destination.display().to_string(),
            bytes,
        })
    }
}

fn upload_error(artifact: &ArtifactSpec, source: std::io::Error) -> ArtifactError {
    ArtifactError::Upload {
        name: artifact.name.clone(),
        source,
    }
}

/// Keeps published file contents in memory (for testing or dry runs)
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: tokio::sync::RwLock<HashMap<(Uuid, String), Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents published under a name for an execution
    pub async fn get(&self, execution_id: Uuid, name: &str) -> Option<Vec<u8>> {
        self.artifacts
            .read()
            .await
            .get(&(execution_id, name.to_string()))
            .cloned()
    }

    /// Number of published artifacts across all executions
    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ArtifactPublisher for InMemoryArtifactStore {
    async fn publish(
        &self,
        artifact: &ArtifactSpec,
        execution_id: Uuid,
    ) -> Result<PublishOutcome, ArtifactError> {
        let contents = match tokio::fs::read(&artifact.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PublishOutcome::Missing {
                    path: artifact.path.clone(),
                });
            }
            Err(source) => return Err(upload_error(artifact, source)),
        };

        let bytes = contents.len() as u64;
        self.artifacts
            .write()
            .await
            .insert((execution_id, artifact.name.clone()), contents);

        Ok(PublishOutcome::Published {
            destination: format!("memory://{}/{}", execution_id, artifact.name),
            bytes,
        })
    }
}
