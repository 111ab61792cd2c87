use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Form fields accepted by the translate endpoint alongside the file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct TranslateParams {
    pub target_language: Option<String>,
    pub custom_language: Option<String>,
}

impl TranslateParams {
    /// Resolves the effective target language name. `custom` selects the
    /// free-form `custom_language` field.
    pub fn resolve(&self) -> Option<String> {
        let selected = self.target_language.as_deref().map(str::trim).unwrap_or("");
        let name = if selected.eq_ignore_ascii_case("custom") {
            self.custom_language.as_deref().map(str::trim).unwrap_or("")
        } else {
            selected
        };

        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

/// A file as received over the wire, before it touches the scratch directory.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub size: usize,
    pub content: Bytes,
    pub mime_type: Option<String>,
}

impl IncomingFile {
    pub fn new(name: String, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        let size = content.len();
        Self {
            name,
            size,
            content,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: String) -> Self {
        self.mime_type = Some(mime_type);
        self
    }

    /// Lowercased extension of the original filename, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn has_pdf_signature(&self) -> bool {
        self.content.starts_with(b"%PDF")
    }
}

/// The persisted upload. Owned by exactly one request; the scratch file is
/// removed when this value is dropped, whatever the outcome of the request.
#[derive(Debug)]
pub struct UploadedDocument {
    path: PathBuf,
    original_name: String,
    declared_size: usize,
    page_count: Option<usize>,
}

impl UploadedDocument {
    pub fn new(path: PathBuf, original_name: impl Into<String>, declared_size: usize) -> Self {
        Self {
            path,
            original_name: original_name.into(),
            declared_size,
            page_count: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn declared_size(&self) -> usize {
        self.declared_size
    }

    pub fn page_count(&self) -> Option<usize> {
        self.page_count
    }

    pub fn set_page_count(&mut self, pages: usize) {
        self.page_count = Some(pages);
    }
}

impl Drop for UploadedDocument {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed scratch upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Could not remove scratch upload, leaving it for the cleanup sweep"
            ),
        }
    }
}
