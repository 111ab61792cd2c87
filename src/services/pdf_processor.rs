use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;
use lopdf::Document;

use crate::error::{AppError, AppResult};

/// Result of native extraction for one page: the embedded text, or why it
/// could not be read.
pub type NativePage = Result<String, String>;

/// Reads the embedded text layer of a document.
pub trait PageTextExtractor: Send + Sync {
    /// One entry per page, in page order. Errors here are document-level
    /// (unreadable or encrypted file); per-page problems go in the entries.
    fn extract_pages(&self, path: &Path) -> AppResult<Vec<NativePage>>;
}

/// Native extraction backed by lopdf.
pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn page_count(path: &Path) -> AppResult<usize> {
        let doc = Document::load(path)?;
        Ok(doc.get_pages().len())
    }
}

impl PageTextExtractor for PdfProcessor {
    fn extract_pages(&self, path: &Path) -> AppResult<Vec<NativePage>> {
        let start = Instant::now();
        let doc = Document::load(path)?;

        if doc.is_encrypted() {
            return Err(AppError::invalid_upload(
                "PDF is password-protected; unlock it before uploading",
            ));
        }

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        tracing::debug!(pages = page_numbers.len(), "Extracting native text layer");

        let pages = page_numbers
            .iter()
            .map(|&page| extract_page(&doc, page))
            .collect::<Vec<_>>();

        tracing::debug!(
            pages = pages.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Native extraction finished"
        );
        Ok(pages)
    }
}

// lopdf can panic on malformed font or content data; contain it to the page.
fn extract_page(doc: &Document, page: u32) -> NativePage {
    match panic::catch_unwind(AssertUnwindSafe(|| doc.extract_text(&[page]))) {
        Ok(Ok(text)) => Ok(text.trim().to_string()),
        Ok(Err(e)) => {
            tracing::warn!(page, error = %e, "Native extraction failed for page");
            Err(format!("native extraction failed: {}", e))
        }
        Err(_) => {
            tracing::warn!(page, "Native extraction panicked for page");
            Err("native extraction failed: malformed page content".to_string())
        }
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}
