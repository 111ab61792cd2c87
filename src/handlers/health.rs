use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::services::{PdftoppmRasterizer, TesseractEngine};
use crate::state::AppState;

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    info!("Health check requested");

    let timestamp = chrono::Utc::now().to_rfc3339();
    let pipeline = state.pipeline.clone();

    // Probing for binaries spawns processes.
    let (pdftoppm, tesseract, soffice) = tokio::task::spawn_blocking(move || {
        (
            PdftoppmRasterizer::is_available(),
            TesseractEngine::is_available(),
            pipeline.converter_available(),
        )
    })
    .await
    .unwrap_or((false, false, false));

    let ai_configured = state.pipeline.ai_configured();
    let pool = state.pool.metrics();

    let status = if ai_configured && pdftoppm && tesseract {
        "healthy"
    } else {
        "degraded"
    };

    let response = json!({
        "status": status,
        "timestamp": timestamp,
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "pdf_processor": true,
            "ocr_rasterizer": pdftoppm,
            "ocr_engine": tesseract,
            "office_converter": soffice,
            "ai_backend": state.pipeline.ai_backend_name(),
            "ai_configured": ai_configured
        },
        "worker_pool": {
            "capacity": pool.capacity,
            "available_permits": pool.available_permits,
            "total_requests": pool.total_requests,
            "rejected_requests": pool.rejected_requests,
            "rejection_rate": if pool.total_requests > 0 {
                (pool.rejected_requests as f64 / pool.total_requests as f64 * 100.0).round() / 100.0
            } else {
                0.0
            }
        },
        "pending_results": state.pipeline.pending().len()
    });

    info!(
        status = status,
        ocr_available = pdftoppm && tesseract,
        office_available = soffice,
        ai_configured = ai_configured,
        "Health check completed"
    );

    Ok(Json(response))
}

/// Readiness: both scratch directories exist and accept writes.
pub async fn ready_handler(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    let upload_ok = is_writable(state.pipeline.upload_dir()).await;
    let output_ok = is_writable(state.pipeline.store().dir()).await;

    if upload_ok && output_ok {
        info!("Readiness check passed");
        Ok(StatusCode::OK)
    } else {
        warn!(upload_ok, output_ok, "Readiness check failed - scratch directory not writable");
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

async fn is_writable(dir: &Path) -> bool {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || tempfile::NamedTempFile::new_in(&dir).is_ok())
        .await
        .unwrap_or(false)
}
