//! Integration tests for the Distill HTTP service

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use common::{
    build_pdf, file_count, multipart_body, multipart_content_type, test_config, test_pipeline, test_state, Part,
    Reply, StubBackend, StubConverter,
};
use distill::{error::AiFailureKind, handlers::create_router, models::OperationKind, AppState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const BODY_LIMIT: usize = 16 * 1024 * 1024;

async fn post_form(app: &Router, uri: &str, parts: &[Part<'_>]) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>, Option<String>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    (status, bytes.to_vec(), disposition)
}

#[tokio::test]
async fn test_summarize_produces_downloadable_artifacts() {
    let scratch = TempDir::new().unwrap();
    let config = test_config(scratch.path());
    let backend = StubBackend::replying("A short summary.");
    let app = create_router(test_state(config.clone(), backend.clone(), None));

    let pdf = build_pdf(&["The quarterly report describes steady growth in all regions."]);
    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "report.pdf", content: &pdf }],
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["operation"], "summarize");
    assert_eq!(data["extraction_status"], "ok");
    assert_eq!(data["stats"]["pages_native"], 1);
    assert_eq!(data["stats"]["truncated"], false);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(backend.last_request().unwrap().kind(), OperationKind::Summarize);

    let txt_url = data["artifacts"]["txt"]["download_url"].as_str().unwrap().to_string();
    let (status, first, disposition) = get(&app, &txt_url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, b"A short summary.");
    assert!(disposition.unwrap().starts_with("attachment"));

    let (status, second, _) = get(&app, &txt_url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);

    let pdf_url = data["artifacts"]["pdf"]["download_url"].as_str().unwrap().to_string();
    let (status, pdf_bytes, _) = get(&app, &pdf_url).await;
    assert_eq!(status, StatusCode::OK);
    assert!(pdf_bytes.starts_with(b"%PDF"));

    assert_eq!(file_count(&config.upload_dir), 0);
}

#[tokio::test]
async fn test_translate_passes_target_and_detected_language() {
    let scratch = TempDir::new().unwrap();
    let config = test_config(scratch.path());
    let backend = StubBackend::replying("Bonjour");
    let app = create_router(test_state(config, backend.clone(), Some("English")));

    let pdf = build_pdf(&["Hello"]);
    let (status, body) = post_form(
        &app,
        "/api/v1/translate",
        &[
            Part::File { name: "hello.pdf", content: &pdf },
            Part::Text { name: "target_language", value: "French" },
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let request = backend.last_request().unwrap();
    assert_eq!(request.kind(), OperationKind::Translate);
    assert_eq!(request.target_language(), Some("French"));
    assert_eq!(request.source_language(), Some("English"));

    let data = &body["data"];
    assert_eq!(data["detected_language"], "English");
    assert_eq!(data["target_language"], "French");

    let txt_url = data["artifacts"]["txt"]["download_url"].as_str().unwrap().to_string();
    let (_, bytes, _) = get(&app, &txt_url).await;
    assert_eq!(bytes, b"Bonjour");
}

#[tokio::test]
async fn test_translate_custom_language() {
    let scratch = TempDir::new().unwrap();
    let backend = StubBackend::replying("nuqneH");
    let app = create_router(test_state(test_config(scratch.path()), backend.clone(), None));

    let pdf = build_pdf(&["Hello there"]);
    let (status, _) = post_form(
        &app,
        "/api/v1/translate",
        &[
            Part::File { name: "hello.pdf", content: &pdf },
            Part::Text { name: "target_language", value: "custom" },
            Part::Text { name: "custom_language", value: "Klingon" },
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.last_request().unwrap().target_language(), Some("Klingon"));
}

#[tokio::test]
async fn test_translate_without_target_is_rejected() {
    let scratch = TempDir::new().unwrap();
    let backend = StubBackend::replying("unused");
    let app = create_router(test_state(test_config(scratch.path()), backend.clone(), None));

    let pdf = build_pdf(&["Hello there"]);
    let (status, body) = post_form(
        &app,
        "/api/v1/translate",
        &[Part::File { name: "hello.pdf", content: &pdf }],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_ai_timeout_leaves_no_artifacts_or_uploads() {
    let scratch = TempDir::new().unwrap();
    let mut config = test_config(scratch.path());
    config.ai_timeout_seconds = 1;
    let backend = Arc::new(StubBackend::new(Reply::Slow(Duration::from_secs(5), "late".into())));
    let app = create_router(test_state(config.clone(), backend, None));

    let pdf = build_pdf(&["This document has plenty of native text to summarize."]);
    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "slow.pdf", content: &pdf }],
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AI_SERVICE_ERROR");
    assert_eq!(file_count(&config.upload_dir), 0);
    assert_eq!(file_count(&config.output_dir), 0);
}

#[tokio::test]
async fn test_ai_call_is_capped_by_request_budget() {
    let scratch = TempDir::new().unwrap();
    let mut config = test_config(scratch.path());
    config.request_timeout_seconds = 1;
    config.ai_timeout_seconds = 5;
    let backend = Arc::new(StubBackend::new(Reply::Slow(Duration::from_secs(3), "late".into())));
    let app = create_router(test_state(config.clone(), backend, None));

    let pdf = build_pdf(&["This document has plenty of native text to summarize."]);
    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "budget.pdf", content: &pdf }],
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT, "{}", body);
    assert_eq!(body["error"]["code"], "AI_SERVICE_ERROR");
    assert_eq!(file_count(&config.upload_dir), 0);
    assert_eq!(file_count(&config.output_dir), 0);
}

#[tokio::test]
async fn test_office_upload_is_converted_then_cleaned_up() {
    let scratch = TempDir::new().unwrap();
    let config = test_config(scratch.path());
    let backend = StubBackend::replying("Summary of the memo.");
    let converter = StubConverter::producing("Converted memo text long enough to stay native.");
    let pipeline = test_pipeline(&config, backend.clone(), None)
        .with_converter(converter.clone())
        .build()
        .unwrap();
    let app = create_router(AppState::new(config.clone(), pipeline));

    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "memo.docx", content: b"PK\x03\x04 not really a docx" }],
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["original_filename"], "memo.docx");
    assert_eq!(body["data"]["extraction_status"], "ok");
    let source = backend.last_request().unwrap().source_text().to_string();
    assert_eq!(source, "Converted memo text long enough to stay native.");

    let inputs = converter.inputs.lock().unwrap().clone();
    let outputs = converter.outputs.lock().unwrap().clone();
    assert_eq!(inputs.len(), 1);
    assert!(!inputs[0].exists());
    assert!(!outputs[0].exists());
    assert_eq!(file_count(&config.upload_dir), 0);
}

#[tokio::test]
async fn test_failed_office_conversion_removes_upload() {
    let scratch = TempDir::new().unwrap();
    let config = test_config(scratch.path());
    let backend = StubBackend::replying("unused");
    let converter = StubConverter::failing();
    let pipeline = test_pipeline(&config, backend.clone(), None)
        .with_converter(converter.clone())
        .build()
        .unwrap();
    let app = create_router(AppState::new(config.clone(), pipeline));

    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "broken.pptx", content: b"not a presentation" }],
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "CONVERSION_FAILED");
    assert_eq!(converter.inputs.lock().unwrap().len(), 1);
    assert_eq!(backend.call_count(), 0);
    assert_eq!(file_count(&config.upload_dir), 0);
}

#[tokio::test]
async fn test_blocked_ai_response_is_bad_gateway() {
    let scratch = TempDir::new().unwrap();
    let backend = Arc::new(StubBackend::new(Reply::Fail(AiFailureKind::Blocked)));
    let app = create_router(test_state(test_config(scratch.path()), backend, None));

    let pdf = build_pdf(&["Some perfectly ordinary text for the model."]);
    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "doc.pdf", content: &pdf }],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "AI_SERVICE_ERROR");
}

#[tokio::test]
async fn test_blank_document_stops_before_ai() {
    let scratch = TempDir::new().unwrap();
    let config = test_config(scratch.path());
    let backend = StubBackend::replying("should not be used");
    let app = create_router(test_state(config.clone(), backend.clone(), None));

    let pdf = build_pdf(&["", "", ""]);
    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "scan.pdf", content: &pdf }],
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "NO_EXTRACTABLE_CONTENT");
    assert_eq!(backend.call_count(), 0);
    assert_eq!(file_count(&config.upload_dir), 0);
}

#[tokio::test]
async fn test_partial_document_reports_failed_pages() {
    let scratch = TempDir::new().unwrap();
    let backend = StubBackend::replying("Summary of two pages.");
    let app = create_router(test_state(test_config(scratch.path()), backend.clone(), None));

    let pdf = build_pdf(&["Hello world", "", "Goodbye"]);
    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "mixed.pdf", content: &pdf }],
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let data = &body["data"];
    assert_eq!(data["extraction_status"], "partial");
    assert_eq!(data["pages"][1]["method"], "failed");
    assert_eq!(data["stats"]["pages_failed"], 1);

    let source = backend.last_request().unwrap().source_text().to_string();
    assert!(source.contains("--- Page 1 ---\nHello world"));
    assert!(source.contains("--- Page 3 ---\nGoodbye"));
    assert!(!source.contains("--- Page 2 ---"));
}

#[tokio::test]
async fn test_upload_rejections() {
    let scratch = TempDir::new().unwrap();
    let backend = StubBackend::replying("unused");
    let app = create_router(test_state(test_config(scratch.path()), backend.clone(), None));

    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "virus.exe", content: b"MZ\x90\x00" }],
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "UNSUPPORTED_FILE_TYPE");

    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::Text { name: "note", value: "no file here" }],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_FILE");

    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "fake.pdf", content: b"definitely not a pdf" }],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_UPLOAD");

    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_result_can_be_read_once() {
    let scratch = TempDir::new().unwrap();
    let backend = StubBackend::replying("Once only.");
    let app = create_router(test_state(test_config(scratch.path()), backend, None));

    let pdf = build_pdf(&["Enough native text to skip the OCR fallback."]);
    let (_, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "doc.pdf", content: &pdf }],
    )
    .await;
    let result_id = body["data"]["result_id"].as_str().unwrap().to_string();

    let (status, bytes, _) = get(&app, &format!("/api/v1/results/{}", result_id)).await;
    assert_eq!(status, StatusCode::OK);
    let result: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(result["data"]["stats"]["generated_chars"], 10);

    let (status, _, _) = get(&app, &format!("/api/v1/results/{}", result_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_rejects_traversal_and_unknown_ids() {
    let scratch = TempDir::new().unwrap();
    let app = create_router(test_state(
        test_config(scratch.path()),
        StubBackend::replying("unused"),
        None,
    ));

    for uri in [
        "/api/v1/download/..%2F..%2Fetc%2Fpasswd",
        "/api/v1/download/not-a-uuid",
        "/api/v1/download/00000000-0000-4000-8000-000000000000",
    ] {
        let (status, _, _) = get(&app, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_health_and_ready() {
    let scratch = TempDir::new().unwrap();
    let config = test_config(scratch.path());
    let state = test_state(config.clone(), StubBackend::replying("unused"), None);
    state.pipeline.ensure_dirs().await.unwrap();
    let app = create_router(state);

    let (status, bytes, _) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["services"]["ai_configured"], true);
    assert_eq!(health["worker_pool"]["capacity"], config.max_concurrent_requests);

    let (status, _, _) = get(&app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_ready_fails_without_scratch_dirs() {
    let scratch = TempDir::new().unwrap();
    let config = test_config(&scratch.path().join("missing"));
    let app = create_router(test_state(config, StubBackend::replying("unused"), None));

    let (status, _, _) = get(&app, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_full_worker_pool_rejects_requests() {
    let scratch = TempDir::new().unwrap();
    let mut config = test_config(scratch.path());
    config.max_concurrent_requests = 1;
    let state = test_state(config, StubBackend::replying("unused"), None);
    let _held = state.pool.try_admit().unwrap();
    let app = create_router(state);

    let pdf = build_pdf(&["Some text"]);
    let (status, body) = post_form(
        &app,
        "/api/v1/summarize",
        &[Part::File { name: "doc.pdf", content: &pdf }],
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
}
