use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::error::{AiFailureKind, AppError, AppResult};
use crate::models::{AiRequest, AiResponse, OperationKind};

/// External generative model. One call per request, no retries.
#[async_trait]
pub trait AiBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &AiRequest, prompt: &str) -> AppResult<String>;
}

/// Roughly four characters per token.
const CHARS_PER_TOKEN: f64 = 4.0;
const MAX_SUMMARY_TOKENS: f64 = 7000.0;
const WORDS_PER_TOKEN: f64 = 0.75;
const MIN_DETAILED_SUMMARY_WORDS: usize = 50;

pub struct AiInvoker {
    backend: Arc<dyn AiBackend>,
    timeout: Duration,
    max_input_chars: usize,
}

impl AiInvoker {
    pub fn new(backend: Arc<dyn AiBackend>, timeout: Duration, max_input_chars: usize) -> Self {
        Self {
            backend,
            timeout,
            max_input_chars,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Builds the bounded request. Oversized input is cut to the ceiling and
    /// flagged rather than rejected.
    pub fn build_request(
        &self,
        kind: OperationKind,
        text: &str,
        target_language: Option<&str>,
        source_language: Option<String>,
    ) -> AppResult<AiRequest> {
        let request = match kind {
            OperationKind::Summarize => AiRequest::summarize(text, self.max_input_chars)?,
            OperationKind::Translate => AiRequest::translate(
                text,
                target_language.unwrap_or_default(),
                source_language,
                self.max_input_chars,
            )?,
        };

        if request.truncated() {
            warn!(
                operation = kind.as_str(),
                original_chars = request.original_chars(),
                submitted_chars = request.submitted_chars(),
                limit = self.max_input_chars,
                "Source text truncated before AI submission"
            );
        }
        Ok(request)
    }

    /// One backend call, bounded by whichever of the AI timeout and
    /// `deadline` comes first. Running out of either is an AI timeout.
    pub async fn invoke(&self, request: &AiRequest, deadline: tokio::time::Instant) -> AiResponse {
        let start = Instant::now();
        let prompt = build_prompt(request);
        let deadline = deadline.min(tokio::time::Instant::now() + self.timeout);
        let budget = deadline.saturating_duration_since(tokio::time::Instant::now());

        info!(
            backend = self.backend.name(),
            operation = request.kind().as_str(),
            source_chars = request.submitted_chars(),
            target_language = ?request.target_language(),
            "Invoking AI backend"
        );

        let outcome = tokio::time::timeout_at(deadline, self.backend.generate(request, &prompt)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                info!(elapsed_ms, generated_chars = text.chars().count(), "AI call succeeded");
                AiResponse::succeeded(text.trim().to_string(), request.truncated())
            }
            Ok(Ok(_)) => {
                warn!(elapsed_ms, "AI backend returned an empty result");
                AiResponse::failed(AiFailureKind::Empty, "AI backend returned an empty result", request.truncated())
            }
            Ok(Err(AppError::AiService { kind, reason })) => {
                error!(elapsed_ms, kind = %kind, reason = %reason, "AI call failed");
                AiResponse::failed(kind, reason, request.truncated())
            }
            Ok(Err(other)) => {
                error!(elapsed_ms, error = %other, "AI call failed");
                AiResponse::failed(AiFailureKind::Http, other.to_string(), request.truncated())
            }
            Err(_) => {
                error!(timeout_secs = budget.as_secs_f64(), "AI call timed out");
                AiResponse::failed(
                    AiFailureKind::Timeout,
                    format!("no response within {:.1}s", budget.as_secs_f64()),
                    request.truncated(),
                )
            }
        }
    }
}

pub fn build_prompt(request: &AiRequest) -> String {
    match request.kind() {
        OperationKind::Summarize => format!(
            "Please summarize the following text.\n\
             Focus on the key points and main ideas.\n\
             {}\n\
             Page markers such as \"--- Page 3 ---\" show where each page begins.\n\n\
             Text to Summarize:\n---\n{}\n---\n\nSummary:\n",
            summary_length_instruction(request.submitted_chars()),
            request.source_text()
        ),
        OperationKind::Translate => {
            let target = request.target_language().unwrap_or("English");
            let source_hint = match request.source_language() {
                Some(source) => format!("The source text appears to be {}; verify this yourself.", source),
                None => "Detect the source language automatically.".to_string(),
            };
            format!(
                "Translate the following text into {target}.\n\
                 {source_hint}\n\
                 Keep the \"--- Page N ---\" markers unchanged.\n\
                 Provide only the translation, without any introductory phrases like \"Here is the translation:\".\n\n\
                 Text to Translate:\n---\n{text}\n---\n\n{target} Translation:\n",
                target = target,
                source_hint = source_hint,
                text = request.source_text()
            )
        }
    }
}

/// Aims for a summary about one fifth of the input's estimated token count,
/// capped, expressed in words.
pub fn summary_length_instruction(source_chars: usize) -> String {
    let estimated_input_tokens = source_chars as f64 / CHARS_PER_TOKEN;
    let target_tokens = (estimated_input_tokens / 5.0).min(MAX_SUMMARY_TOKENS);
    let target_words = (target_tokens * WORDS_PER_TOKEN) as usize;

    if target_words < MIN_DETAILED_SUMMARY_WORDS {
        "Provide a brief, concise summary.".to_string()
    } else {
        format!(
            "Provide a detailed summary that is approximately {} words long. Do not exceed this length significantly.",
            target_words
        )
    }
}
