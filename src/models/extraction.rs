use serde::{Deserialize, Serialize};

/// How the text of a single page was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Native,
    Ocr,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Ok,
    Partial,
    Empty,
}

/// Outcome for one page. Built once by the coordinator and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageExtraction {
    page: usize,
    text: String,
    method: ExtractionMethod,
    fallback_attempted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
}

impl PageExtraction {
    pub fn native(page: usize, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
            method: ExtractionMethod::Native,
            fallback_attempted: false,
            failure_reason: None,
        }
    }

    /// Sparse native text kept after OCR could not improve on it.
    pub fn native_after_fallback(page: usize, text: impl Into<String>) -> Self {
        Self {
            fallback_attempted: true,
            ..Self::native(page, text)
        }
    }

    pub fn ocr(page: usize, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
            method: ExtractionMethod::Ocr,
            fallback_attempted: true,
            failure_reason: None,
        }
    }

    /// A page that yielded nothing. Text is always empty.
    pub fn failed(page: usize, reason: impl Into<String>) -> Self {
        Self {
            page,
            text: String::new(),
            method: ExtractionMethod::Failed,
            fallback_attempted: true,
            failure_reason: Some(reason.into()),
        }
    }

    /// 1-based page number.
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn method(&self) -> ExtractionMethod {
        self.method
    }

    /// Whether the native text layer was judged insufficient and OCR ran.
    pub fn fallback_attempted(&self) -> bool {
        self.fallback_attempted
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Confidence signal: number of characters recovered.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Per-page outcomes for a whole document, in page order.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pages: Vec<PageExtraction>,
    status: ExtractionStatus,
}

impl ExtractionResult {
    /// Classifies the document from its pages:
    /// `empty` when no page recovered a single character, `partial` when any
    /// page failed or went through the OCR fallback, `ok` otherwise.
    pub fn from_pages(pages: Vec<PageExtraction>) -> Self {
        let total_chars: usize = pages.iter().map(PageExtraction::char_count).sum();
        let degraded = pages
            .iter()
            .any(|p| p.fallback_attempted || p.method == ExtractionMethod::Failed);

        let status = if total_chars == 0 {
            ExtractionStatus::Empty
        } else if degraded {
            ExtractionStatus::Partial
        } else {
            ExtractionStatus::Ok
        };

        Self { pages, status }
    }

    pub fn status(&self) -> ExtractionStatus {
        self.status
    }

    pub fn pages(&self) -> &[PageExtraction] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn total_chars(&self) -> usize {
        self.pages.iter().map(PageExtraction::char_count).sum()
    }

    pub fn count_by_method(&self, method: ExtractionMethod) -> usize {
        self.pages.iter().filter(|p| p.method == method).count()
    }

    pub fn fallback_count(&self) -> usize {
        self.pages.iter().filter(|p| p.fallback_attempted).count()
    }

    /// Recovered text of all non-empty pages joined by a single space.
    pub fn aggregated_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Same content as [`aggregated_text`](Self::aggregated_text), with a
    /// `--- Page N ---` marker ahead of each contributing page.
    pub fn marked_text(&self) -> String {
        self.pages
            .iter()
            .filter(|p| !p.text.trim().is_empty())
            .map(|p| format!("--- Page {} ---\n{}", p.page, p.text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
