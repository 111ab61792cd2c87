pub mod ai_invoker;
pub mod artifact_generator;
pub mod cleanup;
pub mod command;
pub mod extraction;
pub mod gemini;
pub mod language;
pub mod ocr_service;
pub mod office_converter;
pub mod pdf_processor;
pub mod pending_results;
pub mod pipeline;
pub mod result_store;
pub mod upload_gate;
pub mod worker_pool;

pub use ai_invoker::{AiBackend, AiInvoker};
pub use artifact_generator::{ArtifactGenerator, ArtifactRenderer, GeneratedArtifacts, PdfRenderer, TextRenderer};
pub use cleanup::{Cleanup, SweepReport};
pub use extraction::ExtractionCoordinator;
pub use gemini::GeminiClient;
pub use language::{LanguageDetector, LinguaDetector};
pub use ocr_service::{OcrEngine, OcrOutcome, OcrService, PdftoppmRasterizer, Rasterizer, TesseractEngine};
pub use office_converter::{DocumentConverter, SofficeConverter};
pub use pdf_processor::{NativePage, PageTextExtractor, PdfProcessor};
pub use pending_results::PendingResults;
pub use pipeline::{Operation, Pipeline, PipelineBuilder};
pub use result_store::ResultStore;
pub use upload_gate::{DocumentFormat, UploadGate};
pub use worker_pool::{PoolMetrics, WorkerPool};
