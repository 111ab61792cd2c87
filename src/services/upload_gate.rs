use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{IncomingFile, UploadedDocument};

const BYTES_PER_MB: usize = 1024 * 1024;

pub const PDF_EXTENSIONS: &[&str] = &["pdf"];
pub const OFFICE_EXTENSIONS: &[&str] = &[
    "doc", "docx", "odt", "rtf", "ppt", "pptx", "odp", "xls", "xlsx", "ods",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    /// Needs conversion to PDF before extraction.
    Office,
}

impl DocumentFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        if PDF_EXTENSIONS.contains(&extension.as_str()) {
            Some(DocumentFormat::Pdf)
        } else if OFFICE_EXTENSIONS.contains(&extension.as_str()) {
            Some(DocumentFormat::Office)
        } else {
            None
        }
    }
}

/// Validates uploads and writes accepted ones to the scratch directory.
pub struct UploadGate {
    upload_dir: PathBuf,
    max_bytes: usize,
}

impl UploadGate {
    pub fn new(upload_dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn validate(&self, file: &IncomingFile) -> AppResult<DocumentFormat> {
        if file.name.trim().is_empty() {
            return Err(AppError::MissingFile);
        }
        if file.size == 0 || file.content.is_empty() {
            return Err(AppError::invalid_upload("File is empty"));
        }
        if file.size > self.max_bytes {
            return Err(AppError::FileTooLarge {
                size: file.size.div_ceil(BYTES_PER_MB),
                limit: self.max_bytes / BYTES_PER_MB,
            });
        }

        let extension = file.extension().ok_or_else(|| AppError::UnsupportedFileType {
            extension: "(none)".to_string(),
        })?;
        let format = DocumentFormat::from_extension(&extension)
            .ok_or(AppError::UnsupportedFileType { extension })?;

        if format == DocumentFormat::Pdf && !file.has_pdf_signature() {
            return Err(AppError::invalid_upload("File does not look like a PDF"));
        }

        Ok(format)
    }

    /// Persists a validated upload under `{uuid}_{sanitized name}`. The
    /// returned document deletes the file when dropped.
    pub async fn admit(&self, file: &IncomingFile) -> AppResult<(UploadedDocument, DocumentFormat)> {
        let format = self.validate(file)?;

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| AppError::storage(format!("Failed to create upload directory: {}", e)))?;

        let path = self
            .upload_dir
            .join(format!("{}_{}", Uuid::new_v4(), sanitize_filename(&file.name)));

        // Take ownership before writing so a partial file is removed on error.
        let document = UploadedDocument::new(path, file.name.clone(), file.size);
        tokio::fs::write(document.path(), &file.content)
            .await
            .map_err(|e| AppError::storage(format!("Failed to save upload: {}", e)))?;

        info!(
            file = %file.name,
            size = file.size,
            format = ?format,
            "Upload accepted"
        );
        debug!(path = %document.path().display(), "Upload written to scratch");
        Ok((document, format))
    }
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
/// Only the final path component of the client-supplied name is used.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}
