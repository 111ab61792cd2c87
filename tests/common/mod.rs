//! Shared fixtures: lopdf-built PDFs and stand-ins for the external tools.

#![allow(dead_code)]

use async_trait::async_trait;
use distill::{
    config::Config,
    error::{AiFailureKind, AppError, AppResult},
    models::AiRequest,
    services::{
        AiBackend, DocumentConverter, LanguageDetector, NativePage, OcrEngine, OcrService, PageTextExtractor,
        PipelineBuilder, Rasterizer,
    },
    AppState,
};
use image::{ImageBuffer, Luma};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A PDF with one page per entry, each showing its text on a single line.
/// An empty string yields a page with no text layer at all.
pub fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            vec![]
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Native extraction with scripted per-page results.
pub struct ScriptedExtractor {
    pub pages: Vec<NativePage>,
}

impl PageTextExtractor for ScriptedExtractor {
    fn extract_pages(&self, _path: &Path) -> AppResult<Vec<NativePage>> {
        Ok(self.pages.clone())
    }
}

/// Writes a real PNG named `page-N.png`. Pages listed in `inked` get a dark
/// block so the raster is not treated as blank; everything else is white.
#[derive(Default)]
pub struct StubRasterizer {
    pub inked: Vec<usize>,
    pub fail: Vec<usize>,
}

#[async_trait]
impl Rasterizer for StubRasterizer {
    async fn rasterize(&self, _pdf: &Path, page: usize, _dpi: u32, out_dir: &Path) -> anyhow::Result<PathBuf> {
        if self.fail.contains(&page) {
            anyhow::bail!("stub rasterizer refused page {}", page);
        }
        let inked = self.inked.contains(&page);
        let image = ImageBuffer::from_fn(64, 64, |x, _| {
            if inked && x < 32 {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        });
        let path = out_dir.join(format!("page-{}.png", page));
        image.save(&path)?;
        Ok(path)
    }
}

/// Returns the text scripted for the page encoded in the raster's filename.
#[derive(Default)]
pub struct ScriptedOcr {
    pub pages: HashMap<usize, String>,
    pub calls: Mutex<Vec<usize>>,
}

impl ScriptedOcr {
    pub fn with_page(mut self, page: usize, text: &str) -> Self {
        self.pages.insert(page, text.to_string());
        self
    }
}

#[async_trait]
impl OcrEngine for ScriptedOcr {
    async fn recognize(&self, image: &Path) -> anyhow::Result<String> {
        let page: usize = image
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix("page-"))
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("unexpected raster name {}", image.display()))?;
        self.calls.lock().unwrap().push(page);
        Ok(self.pages.get(&page).cloned().unwrap_or_default())
    }
}

pub fn stub_ocr(rasterizer: StubRasterizer, engine: Arc<ScriptedOcr>) -> OcrService {
    OcrService::new(Arc::new(rasterizer), engine, 150)
}

pub enum Reply {
    Text(String),
    Fail(AiFailureKind),
    Slow(Duration, String),
}

/// AI backend that records every request it receives.
pub struct StubBackend {
    reply: Reply,
    pub requests: Mutex<Vec<AiRequest>>,
    pub prompts: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self::new(Reply::Text(text.to_string())))
    }

    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<AiRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AiBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, request: &AiRequest, prompt: &str) -> AppResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(kind) => Err(AppError::ai_service(*kind, "stub failure")),
            Reply::Slow(delay, text) => {
                tokio::time::sleep(*delay).await;
                Ok(text.clone())
            }
        }
    }
}

pub struct FixedDetector(pub Option<String>);

impl LanguageDetector for FixedDetector {
    fn detect(&self, _text: &str) -> Option<String> {
        self.0.clone()
    }
}

/// Config rooted in a scratch directory with tight timeouts.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::for_scratch_root(root);
    config.request_timeout_seconds = 30;
    config.ai_timeout_seconds = 5;
    config
}

/// Pipeline wiring with the real lopdf extractor, blank-page OCR stubs and
/// the given backend and detector. Further seams can be swapped before `build`.
pub fn test_pipeline(config: &Config, backend: Arc<StubBackend>, language: Option<&str>) -> PipelineBuilder {
    PipelineBuilder::new(config.clone())
        .with_ocr(stub_ocr(StubRasterizer::default(), Arc::new(ScriptedOcr::default())))
        .with_ai_backend(backend)
        .with_language_detector(Arc::new(FixedDetector(language.map(str::to_string))))
}

pub fn test_state(config: Config, backend: Arc<StubBackend>, language: Option<&str>) -> AppState {
    let pipeline = test_pipeline(&config, backend, language).build().unwrap();
    AppState::new(config, pipeline)
}

/// Stands in for soffice: writes a one-page PDF with `text` next to the
/// upload, or fails with a conversion error when `text` is `None`.
pub struct StubConverter {
    pub text: Option<String>,
    pub inputs: Mutex<Vec<PathBuf>>,
    pub outputs: Mutex<Vec<PathBuf>>,
}

impl StubConverter {
    pub fn producing(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            inputs: Mutex::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            inputs: Mutex::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DocumentConverter for StubConverter {
    async fn convert(&self, input: &Path, out_dir: &Path) -> AppResult<PathBuf> {
        assert!(input.exists(), "upload must exist while converting");
        self.inputs.lock().unwrap().push(input.to_path_buf());

        let text = self
            .text
            .as_deref()
            .ok_or_else(|| AppError::conversion("soffice exited with 1: source file could not be loaded"))?;
        let output = out_dir.join(format!("{}_converted.pdf", uuid::Uuid::new_v4()));
        std::fs::write(&output, build_pdf(&[text])).unwrap();
        self.outputs.lock().unwrap().push(output.clone());
        Ok(output)
    }
}

pub const BOUNDARY: &str = "distill-test-boundary";

pub enum Part<'a> {
    File { name: &'a str, content: &'a [u8] },
    Text { name: &'a str, value: &'a str },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File { name, content } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(content);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value).as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).filter(|e| e.path().is_file()).count())
        .unwrap_or(0)
}
