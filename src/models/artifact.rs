use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Txt,
    Pdf,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Txt, ArtifactKind::Pdf];

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Txt => "txt",
            ArtifactKind::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Txt => "text/plain; charset=utf-8",
            ArtifactKind::Pdf => "application/pdf",
        }
    }
}

/// A generated file in the result store.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: Uuid,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    /// Known when the artifact was just written; not recoverable from disk.
    pub request_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn download_url(&self) -> String {
        format!("/api/v1/download/{}", self.id)
    }
}

/// Whether one artifact kind can be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    Available {
        artifact_id: String,
        download_url: String,
    },
    Failed {
        reason: String,
    },
}

impl ArtifactOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, ArtifactOutcome::Available { .. })
    }

    pub fn artifact_id(&self) -> Option<&str> {
        match self {
            ArtifactOutcome::Available { artifact_id, .. } => Some(artifact_id),
            ArtifactOutcome::Failed { .. } => None,
        }
    }
}

impl From<&Artifact> for ArtifactOutcome {
    fn from(artifact: &Artifact) -> Self {
        ArtifactOutcome::Available {
            artifact_id: artifact.id.to_string(),
            download_url: artifact.download_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub txt: ArtifactOutcome,
    pub pdf: ArtifactOutcome,
}

/// Before/after numbers shown once alongside a finished result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub source_chars: usize,
    pub submitted_chars: usize,
    pub generated_chars: usize,
    pub pages_total: usize,
    pub pages_native: usize,
    pub pages_ocr: usize,
    pub pages_fallback: usize,
    pub pages_failed: usize,
    pub truncated: bool,
}
