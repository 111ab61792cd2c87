//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{AiFailureKind, AppError, AppResult};
use crate::models::AiRequest;
use crate::services::ai_invoker::AiBackend;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// The HTTP timeout matches the AI step budget so a hung connection
    /// is torn down rather than left behind the invoker's own timeout.
    pub fn new(api_key: Option<String>, model: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl AiBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &AiRequest, prompt: &str) -> AppResult<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::ai_service(AiFailureKind::NotConfigured, "GOOGLE_API_KEY is not set")
        })?;

        debug!(
            model = %self.model,
            operation = request.kind().as_str(),
            prompt_chars = prompt.chars().count(),
            "Sending request to Gemini"
        );

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    AiFailureKind::Timeout
                } else {
                    AiFailureKind::Http
                };
                AppError::ai_service(kind, format!("Failed to reach Gemini: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::ai_service(
                AiFailureKind::Http,
                format!(
                    "Gemini API error ({}): {}",
                    status,
                    error_text.chars().take(500).collect::<String>()
                ),
            ));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            AppError::ai_service(AiFailureKind::Malformed, format!("Failed to parse Gemini response: {}", e))
        })?;

        parsed.into_text()
    }
}

impl GenerateContentResponse {
    fn into_text(self) -> AppResult<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            warn!(reason = %reason, "Gemini blocked the prompt");
            return Err(AppError::ai_service(
                AiFailureKind::Blocked,
                format!("Request blocked by safety filters ({})", reason),
            ));
        }

        if let Some(usage) = &self.usage_metadata {
            info!(
                prompt_tokens = usage.prompt_token_count,
                completion_tokens = usage.candidates_token_count,
                total_tokens = usage.total_token_count,
                "Gemini response received"
            );
        }

        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            AppError::ai_service(AiFailureKind::Empty, "Gemini returned no candidates")
        })?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(AppError::ai_service(
                AiFailureKind::Blocked,
                "Response blocked by safety filters (SAFETY)",
            ));
        }

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::ai_service(AiFailureKind::Empty, "Gemini returned an empty response"));
        }
        Ok(text.to_string())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AppResult<String> {
        serde_json::from_str::<GenerateContentResponse>(json)
            .expect("valid fixture")
            .into_text()
    }

    #[test]
    fn joins_candidate_parts() {
        let text = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Bon"},{"text":"jour "}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(text, "Bonjour");
    }

    #[test]
    fn blocked_prompt_maps_to_blocked() {
        let err = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert!(matches!(err, AppError::AiService { kind: AiFailureKind::Blocked, .. }));
    }

    #[test]
    fn no_candidates_maps_to_empty() {
        let err = parse(r#"{"candidates":[]}"#).unwrap_err();
        assert!(matches!(err, AppError::AiService { kind: AiFailureKind::Empty, .. }));
    }

    #[test]
    fn whitespace_only_text_is_empty() {
        let err = parse(r#"{"candidates":[{"content":{"parts":[{"text":"  \n"}]}}]}"#).unwrap_err();
        assert!(matches!(err, AppError::AiService { kind: AiFailureKind::Empty, .. }));
    }
}
