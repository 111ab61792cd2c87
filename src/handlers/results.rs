use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::ResultResponse;
use crate::state::AppState;

/// Hands out a finished result once. The second read, like an unknown id,
/// is a 404.
pub async fn result_handler(
    State(state): State<AppState>,
    Path(result_id): Path<String>,
) -> AppResult<Json<ResultResponse>> {
    let data = state
        .pipeline
        .pending()
        .take(&result_id)
        .ok_or_else(|| AppError::not_found("result"))?;

    info!(result_id = %result_id, "Pending result delivered");
    Ok(Json(ResultResponse { success: true, data }))
}

pub async fn download_handler(
    State(state): State<AppState>,
    Path(artifact_id): Path<String>,
) -> AppResult<Response> {
    let (artifact, bytes) = state.pipeline.store().read(&artifact_id).await?;

    info!(
        artifact_id = %artifact.id,
        kind = artifact.kind.extension(),
        bytes = bytes.len(),
        "Serving artifact"
    );

    let disposition = format!(
        "attachment; filename=\"{}.{}\"",
        artifact.id,
        artifact.kind.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, artifact.kind.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
