use serde::{Deserialize, Serialize};

use crate::error::{AiFailureKind, AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Summarize,
    Translate,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Summarize => "summarize",
            OperationKind::Translate => "translate",
        }
    }
}

/// One submission to the AI backend. Constructed once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiRequest {
    kind: OperationKind,
    source_text: String,
    target_language: Option<String>,
    source_language: Option<String>,
    truncated: bool,
    original_chars: usize,
}

impl AiRequest {
    pub fn summarize(text: &str, max_chars: usize) -> AppResult<Self> {
        Self::build(OperationKind::Summarize, text, None, None, max_chars)
    }

    pub fn translate(
        text: &str,
        target_language: &str,
        source_language: Option<String>,
        max_chars: usize,
    ) -> AppResult<Self> {
        let target = target_language.trim();
        if target.is_empty() {
            return Err(AppError::validation("Target language not specified"));
        }
        Self::build(
            OperationKind::Translate,
            text,
            Some(target.to_string()),
            source_language,
            max_chars,
        )
    }

    fn build(
        kind: OperationKind,
        text: &str,
        target_language: Option<String>,
        source_language: Option<String>,
        max_chars: usize,
    ) -> AppResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::NoExtractableContent { pages: 0 });
        }

        let original_chars = text.chars().count();
        let (source_text, truncated) = truncate_chars(text, max_chars);

        Ok(Self {
            kind,
            source_text: source_text.to_string(),
            target_language,
            source_language,
            truncated,
            original_chars,
        })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn target_language(&self) -> Option<&str> {
        self.target_language.as_deref()
    }

    pub fn source_language(&self) -> Option<&str> {
        self.source_language.as_deref()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn original_chars(&self) -> usize {
        self.original_chars
    }

    pub fn submitted_chars(&self) -> usize {
        self.source_text.chars().count()
    }
}

/// Cuts `text` to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiResponse {
    pub text: String,
    pub success: bool,
    pub failure_kind: Option<AiFailureKind>,
    pub failure_reason: Option<String>,
    pub truncated: bool,
}

impl AiResponse {
    pub fn succeeded(text: String, truncated: bool) -> Self {
        Self {
            text,
            success: true,
            failure_kind: None,
            failure_reason: None,
            truncated,
        }
    }

    /// Failed responses never carry generated text.
    pub fn failed(kind: AiFailureKind, reason: impl Into<String>, truncated: bool) -> Self {
        Self {
            text: String::new(),
            success: false,
            failure_kind: Some(kind),
            failure_reason: Some(reason.into()),
            truncated,
        }
    }

    pub fn into_result(self) -> AppResult<String> {
        if self.success {
            Ok(self.text)
        } else {
            Err(AppError::ai_service(
                self.failure_kind.unwrap_or(AiFailureKind::Http),
                self.failure_reason.unwrap_or_else(|| "unknown failure".to_string()),
            ))
        }
    }
}
