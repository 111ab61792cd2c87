use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Artifact, ArtifactKind};
use crate::services::cleanup::remove_if_exists;

/// Scratch directory of generated artifacts. Every file is named by a fresh
/// UUIDv4, and lookups only ever build paths from a parsed UUID.
pub struct ResultStore {
    dir: PathBuf,
    retention: Duration,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub async fn ensure_dir(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::storage(format!("Failed to create {}: {}", self.dir.display(), e)))
    }

    fn path_for(&self, id: &Uuid, kind: ArtifactKind) -> PathBuf {
        self.dir.join(format!("{}.{}", id.hyphenated(), kind.extension()))
    }

    /// Writes to a hidden temporary name first so a reader never sees a
    /// half-written artifact.
    pub async fn put(&self, kind: ArtifactKind, bytes: &[u8], request_id: Uuid) -> AppResult<Artifact> {
        self.ensure_dir().await?;

        let id = Uuid::new_v4();
        let path = self.path_for(&id, kind);
        let partial = self.dir.join(format!(".{}.part", id.simple()));

        if let Err(e) = tokio::fs::write(&partial, bytes).await {
            let _ = remove_if_exists(&partial).await;
            return Err(AppError::storage(format!("Failed to write artifact: {}", e)));
        }
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = remove_if_exists(&partial).await;
            return Err(AppError::storage(format!("Failed to publish artifact: {}", e)));
        }

        debug!(
            request_id = %request_id,
            artifact_id = %id,
            kind = kind.extension(),
            bytes = bytes.len(),
            "Artifact stored"
        );

        Ok(Artifact {
            id,
            kind,
            path,
            request_id: Some(request_id),
            created_at: Utc::now(),
        })
    }

    /// Resolves an identifier this store handed out. Anything that is not a
    /// UUID, or whose file is gone or past retention, is "not found".
    pub async fn resolve(&self, artifact_id: &str) -> AppResult<Artifact> {
        let id = Uuid::parse_str(artifact_id.trim())
            .map_err(|_| AppError::not_found("artifact"))?;

        for kind in ArtifactKind::ALL {
            let path = self.path_for(&id, kind);
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
            if is_expired(modified, self.retention) {
                info!(artifact_id = %id, "Artifact past retention, removing");
                let _ = remove_if_exists(&path).await;
                return Err(AppError::not_found("artifact (expired)"));
            }

            return Ok(Artifact {
                id,
                kind,
                path,
                request_id: None,
                created_at: DateTime::<Utc>::from(modified),
            });
        }

        Err(AppError::not_found("artifact"))
    }

    /// Reading does not consume the artifact; repeated downloads within the
    /// retention window return the same bytes.
    pub async fn read(&self, artifact_id: &str) -> AppResult<(Artifact, Vec<u8>)> {
        let artifact = self.resolve(artifact_id).await?;
        match tokio::fs::read(&artifact.path).await {
            Ok(bytes) => Ok((artifact, bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::not_found("artifact")),
            Err(e) => Err(AppError::storage(format!("Failed to read artifact: {}", e))),
        }
    }

    pub async fn discard(&self, artifacts: &[Artifact]) {
        for artifact in artifacts {
            if let Err(e) = remove_if_exists(&artifact.path).await {
                warn!(artifact_id = %artifact.id, error = %e, "Failed to discard artifact");
            }
        }
    }
}

pub(crate) fn is_expired(modified: SystemTime, retention: Duration) -> bool {
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > retention)
        .unwrap_or(false)
}
