//! One summarize/translate request from upload to pending result.
//!
//! The pipeline owns the request timeout. Every scratch file it creates is
//! held by a drop guard, so success, failure and a timed-out (dropped) future
//! all leave the upload directory clean.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{
    ExtractionMethod, ExtractionResult, ExtractionStatus, IncomingFile, OperationKind, PageSummary,
    ProcessData, SessionStats, UploadedDocument,
};
use crate::services::ai_invoker::{AiBackend, AiInvoker};
use crate::services::artifact_generator::ArtifactGenerator;
use crate::services::cleanup::Cleanup;
use crate::services::extraction::ExtractionCoordinator;
use crate::services::gemini::GeminiClient;
use crate::services::language::{LanguageDetector, LinguaDetector};
use crate::services::ocr_service::OcrService;
use crate::services::office_converter::{DocumentConverter, SofficeConverter};
use crate::services::pdf_processor::{PageTextExtractor, PdfProcessor};
use crate::services::pending_results::PendingResults;
use crate::services::result_store::ResultStore;
use crate::services::upload_gate::{DocumentFormat, UploadGate};

/// Time left after an AI timeout inside the request budget to report it as one.
const AI_DEADLINE_HEADROOM: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Summarize,
    Translate { target_language: String },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Summarize => OperationKind::Summarize,
            Operation::Translate { .. } => OperationKind::Translate,
        }
    }

    fn target_language(&self) -> Option<&str> {
        match self {
            Operation::Summarize => None,
            Operation::Translate { target_language } => Some(target_language),
        }
    }
}

pub struct Pipeline {
    gate: UploadGate,
    converter: Arc<dyn DocumentConverter>,
    extraction: ExtractionCoordinator,
    detector: Arc<dyn LanguageDetector>,
    ai: AiInvoker,
    ai_configured: bool,
    generator: ArtifactGenerator,
    store: Arc<ResultStore>,
    pending: PendingResults,
    cleanup: Arc<Cleanup>,
    request_timeout: Duration,
}

/// Wires the pipeline from configuration. Any collaborator left unset gets
/// its production implementation.
pub struct PipelineBuilder {
    config: Config,
    extractor: Option<Arc<dyn PageTextExtractor>>,
    ocr: Option<OcrService>,
    backend: Option<Arc<dyn AiBackend>>,
    detector: Option<Arc<dyn LanguageDetector>>,
    converter: Option<Arc<dyn DocumentConverter>>,
}

impl PipelineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            extractor: None,
            ocr: None,
            backend: None,
            detector: None,
            converter: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PageTextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_ocr(mut self, ocr: OcrService) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_ai_backend(mut self, backend: Arc<dyn AiBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_language_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn build(self) -> AppResult<Pipeline> {
        let config = self.config;

        let (backend, ai_configured): (Arc<dyn AiBackend>, bool) = match self.backend {
            Some(backend) => (backend, true),
            None => {
                let client = GeminiClient::new(
                    config.google_api_key().map(str::to_string),
                    config.gemini_model.clone(),
                    config.ai_timeout(),
                )?;
                if !client.is_configured() {
                    warn!("GOOGLE_API_KEY not set, AI requests will fail until it is configured");
                }
                let configured = client.is_configured();
                (Arc::new(client), configured)
            }
        };

        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(PdfProcessor::new()));
        let ocr = self.ocr.unwrap_or_else(|| OcrService::from_config(&config));
        let detector = self
            .detector
            .unwrap_or_else(|| Arc::new(LinguaDetector::new()));
        let converter = self.converter.unwrap_or_else(|| {
            Arc::new(SofficeConverter::new(
                config.soffice_path.clone(),
                config.office_timeout(),
            ))
        });

        let pending = PendingResults::new(config.retention());
        let cleanup = Cleanup::new(
            vec![config.upload_dir.clone(), config.output_dir.clone()],
            config.retention(),
        )
        .with_pending_results(pending.clone());

        Ok(Pipeline {
            gate: UploadGate::new(config.upload_dir.clone(), config.max_file_size_bytes()),
            converter,
            extraction: ExtractionCoordinator::new(extractor, ocr, config.min_native_chars),
            detector,
            ai: AiInvoker::new(backend, config.ai_timeout(), config.max_ai_input_chars),
            ai_configured,
            generator: ArtifactGenerator::new(),
            store: Arc::new(ResultStore::new(config.output_dir.clone(), config.retention())),
            pending,
            cleanup: Arc::new(cleanup),
            request_timeout: config.request_timeout(),
        })
    }
}

impl Pipeline {
    pub fn builder(config: Config) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    pub fn pending(&self) -> &PendingResults {
        &self.pending
    }

    pub fn cleanup(&self) -> &Arc<Cleanup> {
        &self.cleanup
    }

    pub fn upload_dir(&self) -> &std::path::Path {
        self.gate.dir()
    }

    pub fn converter_available(&self) -> bool {
        self.converter.is_available()
    }

    pub fn ai_configured(&self) -> bool {
        self.ai_configured
    }

    pub fn ai_backend_name(&self) -> &str {
        self.ai.backend_name()
    }

    pub async fn ensure_dirs(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(self.gate.dir())
            .await
            .map_err(|e| AppError::storage(format!("Failed to create upload directory: {}", e)))?;
        self.store.ensure_dir().await
    }

    pub async fn run(&self, file: IncomingFile, operation: Operation) -> AppResult<ProcessData> {
        let request_id = Uuid::new_v4();
        let start = Instant::now();

        let cleanup = Arc::clone(&self.cleanup);
        tokio::spawn(async move {
            cleanup.sweep().await;
        });

        let (document, format) = self.gate.admit(&file).await?;
        info!(
            request_id = %request_id,
            operation = operation.kind().as_str(),
            file = %file.name,
            "Processing request"
        );

        let deadline = tokio::time::Instant::now() + self.request_timeout;
        let outcome = tokio::time::timeout_at(
            deadline,
            self.process(request_id, document, format, &operation, deadline),
        )
        .await;

        match outcome {
            Ok(Ok(data)) => {
                info!(
                    request_id = %request_id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Request completed"
                );
                self.pending.insert(request_id, data.clone());
                Ok(data)
            }
            Ok(Err(e)) => {
                warn!(request_id = %request_id, error = %e, "Request failed");
                Err(e)
            }
            Err(_) => {
                warn!(
                    request_id = %request_id,
                    timeout_secs = self.request_timeout.as_secs(),
                    "Request timed out"
                );
                Err(AppError::Timeout)
            }
        }
    }

    async fn process(
        &self,
        request_id: Uuid,
        document: UploadedDocument,
        format: DocumentFormat,
        operation: &Operation,
        deadline: tokio::time::Instant,
    ) -> AppResult<ProcessData> {
        let original_filename = document.original_name().to_string();

        let mut source = match format {
            DocumentFormat::Pdf => document,
            DocumentFormat::Office => {
                let converted = self.converter.convert(document.path(), self.gate.dir()).await?;
                let pdf = UploadedDocument::new(converted, document.original_name(), document.declared_size());
                drop(document);
                pdf
            }
        };

        let extraction = self.extraction.extract(&mut source).await?;
        drop(source);

        if extraction.status() == ExtractionStatus::Empty {
            return Err(AppError::NoExtractableContent {
                pages: extraction.page_count(),
            });
        }

        let detected_language = match operation {
            Operation::Summarize => None,
            Operation::Translate { .. } => self.detect_language(extraction.aggregated_text()).await,
        };

        let source_text = if extraction.page_count() > 1 {
            extraction.marked_text()
        } else {
            extraction.aggregated_text()
        };
        let request = self.ai.build_request(
            operation.kind(),
            &source_text,
            operation.target_language(),
            detected_language.clone(),
        )?;

        let ai_deadline = deadline.checked_sub(AI_DEADLINE_HEADROOM).unwrap_or(deadline);
        let generated = self
            .ai
            .invoke(&request, ai_deadline)
            .await
            .into_result()?;
        let artifacts = self
            .generator
            .materialize(&generated, &self.store, request_id)
            .await?;

        Ok(ProcessData {
            result_id: request_id.to_string(),
            operation: operation.kind(),
            original_filename,
            extraction_status: extraction.status(),
            pages: page_summaries(&extraction),
            detected_language,
            target_language: operation.target_language().map(str::to_string),
            artifacts: artifacts.outcomes(),
            stats: SessionStats {
                source_chars: extraction.total_chars(),
                submitted_chars: request.submitted_chars(),
                generated_chars: generated.chars().count(),
                pages_total: extraction.page_count(),
                pages_native: extraction.count_by_method(ExtractionMethod::Native),
                pages_ocr: extraction.count_by_method(ExtractionMethod::Ocr),
                pages_fallback: extraction.fallback_count(),
                pages_failed: extraction.count_by_method(ExtractionMethod::Failed),
                truncated: request.truncated(),
            },
        })
    }

    async fn detect_language(&self, text: String) -> Option<String> {
        let detector = Arc::clone(&self.detector);
        tokio::task::spawn_blocking(move || detector.detect(&text))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Language detection task failed");
                None
            })
    }
}

fn page_summaries(extraction: &ExtractionResult) -> Vec<PageSummary> {
    extraction
        .pages()
        .iter()
        .map(|page| PageSummary {
            page: page.page(),
            method: page.method(),
            fallback_attempted: page.fallback_attempted(),
            chars: page.char_count(),
            failure_reason: page.failure_reason().map(str::to_string),
        })
        .collect()
}
