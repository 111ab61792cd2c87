//! Per-page strategy selection: native text first, OCR when the text layer is
//! missing or too sparse to trust.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{ExtractionResult, PageExtraction, UploadedDocument};
use crate::services::ocr_service::{OcrOutcome, OcrService};
use crate::services::pdf_processor::{NativePage, PageTextExtractor};

pub struct ExtractionCoordinator {
    extractor: Arc<dyn PageTextExtractor>,
    ocr: OcrService,
    min_native_chars: usize,
}

impl ExtractionCoordinator {
    pub fn new(extractor: Arc<dyn PageTextExtractor>, ocr: OcrService, min_native_chars: usize) -> Self {
        Self {
            extractor,
            ocr,
            min_native_chars,
        }
    }

    /// Produces one `PageExtraction` per page, in order. A page that cannot be
    /// read by either strategy is recorded as failed and processing continues.
    pub async fn extract(&self, doc: &mut UploadedDocument) -> AppResult<ExtractionResult> {
        let start = Instant::now();
        let extractor = Arc::clone(&self.extractor);
        let path = doc.path().to_path_buf();

        let native_pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&path))
            .await
            .map_err(|e| AppError::internal(format!("Native extraction task failed: {}", e)))??;

        doc.set_page_count(native_pages.len());
        info!(
            file = %doc.original_name(),
            pages = native_pages.len(),
            "Starting per-page extraction"
        );

        let mut pages = Vec::with_capacity(native_pages.len());
        for (index, native) in native_pages.into_iter().enumerate() {
            let page = self.resolve_page(doc.path(), index + 1, native).await;
            debug!(
                page = page.page(),
                method = ?page.method(),
                chars = page.char_count(),
                "Page resolved"
            );
            pages.push(page);
        }

        let result = ExtractionResult::from_pages(pages);
        info!(
            file = %doc.original_name(),
            status = ?result.status(),
            pages = result.page_count(),
            chars = result.total_chars(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Extraction finished"
        );
        Ok(result)
    }

    async fn resolve_page(&self, pdf: &Path, page: usize, native: NativePage) -> PageExtraction {
        let (native_text, native_error) = match native {
            Ok(text) => (text, None),
            Err(reason) => (String::new(), Some(reason)),
        };
        let native_chars = native_text.chars().count();

        if native_error.is_none() && native_chars >= self.min_native_chars {
            return PageExtraction::native(page, native_text);
        }

        debug!(
            page,
            native_chars,
            threshold = self.min_native_chars,
            "Native text insufficient, falling back to OCR"
        );

        match self.ocr.recognize_page(pdf, page).await {
            OcrOutcome::Recognized(text) if text.chars().count() > native_chars => {
                PageExtraction::ocr(page, text)
            }
            _ if native_chars > 0 => PageExtraction::native_after_fallback(page, native_text),
            OcrOutcome::Recognized(_) => {
                PageExtraction::failed(page, join_reasons(native_error, "no text recognized"))
            }
            OcrOutcome::Failed(reason) => {
                PageExtraction::failed(page, join_reasons(native_error, &reason))
            }
        }
    }
}

fn join_reasons(native_error: Option<String>, ocr_reason: &str) -> String {
    match native_error {
        Some(native) => format!("{}; {}", native, ocr_reason),
        None => format!("no text layer; {}", ocr_reason),
    }
}
