use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use chrono;

pub type AppResult<T> = Result<T, AppError>;

/// Why the AI step failed. Every kind surfaces as a single `AiService` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AiFailureKind {
    Timeout,
    Blocked,
    Http,
    Malformed,
    Empty,
    NotConfigured,
}

impl fmt::Display for AiFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AiFailureKind::Timeout => "timeout",
            AiFailureKind::Blocked => "blocked",
            AiFailureKind::Http => "http",
            AiFailureKind::Malformed => "malformed response",
            AiFailureKind::Empty => "empty response",
            AiFailureKind::NotConfigured => "not configured",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("File too large: {size}MB exceeds limit of {limit}MB")]
    FileTooLarge { size: usize, limit: usize },

    #[error("Invalid upload: {message}")]
    InvalidUpload { message: String },

    #[error("Unsupported file type: {extension}")]
    UnsupportedFileType { extension: String },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Rate limit exceeded: maximum concurrent requests reached")]
    RateLimitExceeded,

    #[error("No extractable content: {pages} page(s) yielded no text")]
    NoExtractableContent { pages: usize },

    #[error("AI service error ({kind}): {reason}")]
    AiService { kind: AiFailureKind, reason: String },

    #[error("Artifact generation failed: {message}")]
    ArtifactGeneration { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Document conversion failed: {message}")]
    Conversion { message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::InvalidUpload { .. } => "INVALID_UPLOAD",
            AppError::UnsupportedFileType { .. } => "UNSUPPORTED_FILE_TYPE",
            AppError::MissingFile => "MISSING_FILE",
            AppError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AppError::NoExtractableContent { .. } => "NO_EXTRACTABLE_CONTENT",
            AppError::AiService { .. } => "AI_SERVICE_ERROR",
            AppError::ArtifactGeneration { .. } => "ARTIFACT_GENERATION_FAILED",
            AppError::Storage { .. } => "STORAGE_ERROR",
            AppError::Conversion { .. } => "CONVERSION_FAILED",
            AppError::Timeout => "REQUEST_TIMEOUT",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Internal { .. } => "INTERNAL_ERROR",
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::ConfigError { .. } => "CONFIG_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidUpload { .. } => StatusCode::BAD_REQUEST,
            AppError::UnsupportedFileType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::MissingFile => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::NoExtractableContent { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::AiService { kind: AiFailureKind::Timeout, .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::AiService { .. } => StatusCode::BAD_GATEWAY,
            AppError::ArtifactGeneration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Conversion { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::ConfigError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Upload problems the caller can fix by sending a different file.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::FileTooLarge { .. }
                | AppError::InvalidUpload { .. }
                | AppError::UnsupportedFileType { .. }
                | AppError::MissingFile
                | AppError::ValidationError { .. }
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();
        let request_id = Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().to_rfc3339();

        if status.is_server_error() {
            tracing::error!(
                error_code = error_code,
                status_code = %status,
                request_id = %request_id,
                error_message = %message,
                "API error occurred"
            );
        } else {
            tracing::warn!(
                error_code = error_code,
                status_code = %status,
                request_id = %request_id,
                error_message = %message,
                "Request rejected"
            );
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
                "request_id": request_id,
                "timestamp": timestamp
            },
            "data": null
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError {
            message: format!("JSON parsing error: {}", err),
        }
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout
    }
}

impl From<lopdf::Error> for AppError {
    fn from(err: lopdf::Error) -> Self {
        AppError::InvalidUpload {
            message: format!("Unreadable PDF: {}", err),
        }
    }
}

impl AppError {
    pub fn invalid_upload(message: impl Into<String>) -> Self {
        AppError::InvalidUpload {
            message: message.into(),
        }
    }

    pub fn ai_service(kind: AiFailureKind, reason: impl Into<String>) -> Self {
        AppError::AiService {
            kind,
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        AppError::Storage {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound { what: what.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AppError::ConfigError {
            message: message.into(),
        }
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        AppError::Conversion {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }
}
