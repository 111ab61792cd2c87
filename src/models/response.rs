use serde::{Deserialize, Serialize};

use super::{ArtifactSet, ExtractionMethod, ExtractionStatus, OperationKind, SessionStats};

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub data: ProcessData,
    pub processing_time_ms: u64,
}

/// Everything a caller needs to present a finished summarize/translate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessData {
    pub result_id: String,
    pub operation: OperationKind,
    pub original_filename: String,
    pub extraction_status: ExtractionStatus,
    pub pages: Vec<PageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    pub artifacts: ArtifactSet,
    pub stats: SessionStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub page: usize,
    pub method: ExtractionMethod,
    pub fallback_attempted: bool,
    pub chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultResponse {
    pub success: bool,
    pub data: ProcessData,
}

impl ProcessResponse {
    pub fn new(data: ProcessData, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            data,
            processing_time_ms,
        }
    }
}
