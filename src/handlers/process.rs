use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    response::Json,
};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{IncomingFile, ProcessResponse, TranslateParams};
use crate::services::Operation;
use crate::state::AppState;

/// What a pipeline form carried besides the file.
#[derive(Debug, Default)]
struct ProcessForm {
    file: Option<IncomingFile>,
    translate: TranslateParams,
}

pub async fn summarize_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ProcessResponse>> {
    let start = Instant::now();
    let form = read_form(&mut multipart, state.config.max_file_size_bytes()).await?;
    let file = form.file.ok_or(AppError::MissingFile)?;

    info!(file_name = %file.name, file_size = file.size, "Summarize request received");
    let data = state.pipeline.run(file, Operation::Summarize).await?;

    Ok(Json(ProcessResponse::new(data, start.elapsed().as_millis() as u64)))
}

pub async fn translate_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ProcessResponse>> {
    let start = Instant::now();
    let form = read_form(&mut multipart, state.config.max_file_size_bytes()).await?;
    let file = form.file.ok_or(AppError::MissingFile)?;
    let target_language = form
        .translate
        .resolve()
        .ok_or_else(|| AppError::validation("Target language not specified"))?;

    info!(
        file_name = %file.name,
        file_size = file.size,
        target_language = %target_language,
        "Translate request received"
    );
    let data = state
        .pipeline
        .run(file, Operation::Translate { target_language })
        .await?;

    Ok(Json(ProcessResponse::new(data, start.elapsed().as_millis() as u64)))
}

async fn read_form(multipart: &mut Multipart, max_bytes: usize) -> AppResult<ProcessForm> {
    let mut form = ProcessForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e.status(), e.body_text(), max_bytes))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => form.file = read_file(field, max_bytes).await?,
            "target_language" => form.translate.target_language = Some(read_text(field, max_bytes).await?),
            "custom_language" => form.translate.custom_language = Some(read_text(field, max_bytes).await?),
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

/// A file input left empty by the browser arrives without a filename; that
/// counts as no file at all.
async fn read_file(field: Field<'_>, max_bytes: usize) -> AppResult<Option<IncomingFile>> {
    let file_name = match field.file_name() {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => return Ok(None),
    };
    let content_type = field.content_type().map(|ct| ct.to_string());

    let data = field
        .bytes()
        .await
        .map_err(|e| multipart_error(e.status(), e.body_text(), max_bytes))?;

    let mut file = IncomingFile::new(file_name, data);
    if let Some(mime_type) = content_type {
        file = file.with_mime_type(mime_type);
    }
    debug!(file_name = %file.name, size = file.size, mime_type = ?file.mime_type, "Read upload from form");
    Ok(Some(file))
}

async fn read_text(field: Field<'_>, max_bytes: usize) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| multipart_error(e.status(), e.body_text(), max_bytes))
}

fn multipart_error(status: StatusCode, detail: String, max_bytes: usize) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        let limit = max_bytes / (1024 * 1024);
        warn!(limit_mb = limit, "Upload rejected by body limit");
        return AppError::FileTooLarge { size: limit + 1, limit };
    }
    AppError::invalid_upload(format!("Failed to read multipart form: {}", detail))
}
