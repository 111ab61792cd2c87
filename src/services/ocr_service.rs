use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::services::command::{is_command_available, run_with_timeout};

/// Renders one page of a PDF to an image file.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Writes the raster for `page` (1-based) into `out_dir` and returns its path.
    async fn rasterize(&self, pdf: &Path, page: usize, dpi: u32, out_dir: &Path) -> Result<PathBuf>;
}

/// Recognizes text in an image file.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String>;
}

pub struct PdftoppmRasterizer {
    timeout: Duration,
}

impl PdftoppmRasterizer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn is_available() -> bool {
        is_command_available("pdftoppm", "-v")
    }
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf: &Path, page: usize, dpi: u32, out_dir: &Path) -> Result<PathBuf> {
        let prefix = out_dir.join(format!("page-{}", page));
        let page_arg = page.to_string();

        run_with_timeout(
            Command::new("pdftoppm")
                .arg("-png")
                .arg("-r")
                .arg(dpi.to_string())
                .arg("-f")
                .arg(&page_arg)
                .arg("-l")
                .arg(&page_arg)
                .arg("-singlefile")
                .arg(pdf)
                .arg(&prefix),
            self.timeout,
        )
        .await?;

        let image = prefix.with_extension("png");
        if !tokio::fs::try_exists(&image).await.unwrap_or(false) {
            anyhow::bail!("pdftoppm produced no image for page {}", page);
        }
        Ok(image)
    }
}

pub struct TesseractEngine {
    language: String,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            language: language.into(),
            timeout,
        }
    }

    pub fn is_available() -> bool {
        is_command_available("tesseract", "--version")
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: &Path) -> Result<String> {
        let output = run_with_timeout(
            Command::new("tesseract")
                .arg(image)
                .arg("stdout")
                .arg("-l")
                .arg(&self.language),
            self.timeout,
        )
        .await
        .with_context(|| format!("tesseract ({}) failed", self.language))?;

        Ok(String::from_utf8_lossy(&output.stdout).replace('\x0c', ""))
    }
}

/// Result of the fallback for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrOutcome {
    Recognized(String),
    Failed(String),
}

/// Rasterize-then-recognize fallback for pages whose text layer is unusable.
#[derive(Clone)]
pub struct OcrService {
    rasterizer: Arc<dyn Rasterizer>,
    engine: Arc<dyn OcrEngine>,
    dpi: u32,
}

impl OcrService {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, engine: Arc<dyn OcrEngine>, dpi: u32) -> Self {
        Self {
            rasterizer,
            engine,
            dpi,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(PdftoppmRasterizer::new(config.ocr_timeout())),
            Arc::new(TesseractEngine::new(config.ocr_language.clone(), config.ocr_timeout())),
            config.ocr_dpi,
        )
    }

    /// Never fails the document: every problem becomes `OcrOutcome::Failed`.
    /// The raster lives in a temporary directory removed before returning.
    pub async fn recognize_page(&self, pdf: &Path, page: usize) -> OcrOutcome {
        let start = Instant::now();
        match self.try_recognize_page(pdf, page).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(
                    page,
                    chars = text.trim().chars().count(),
                    dpi = self.dpi,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "OCR recovered page text"
                );
                OcrOutcome::Recognized(text.trim().to_string())
            }
            Ok(_) => {
                debug!(page, "OCR found no text on page");
                OcrOutcome::Failed("no text recognized".to_string())
            }
            Err(e) => {
                warn!(page, error = %e, "OCR failed for page");
                OcrOutcome::Failed(format!("ocr failed: {:#}", e))
            }
        }
    }

    async fn try_recognize_page(&self, pdf: &Path, page: usize) -> Result<String> {
        let scratch = tempfile::Builder::new()
            .prefix("ocr_")
            .tempdir()
            .context("Failed to create raster directory")?;

        let image = self
            .rasterizer
            .rasterize(pdf, page, self.dpi, scratch.path())
            .await
            .context("rasterization failed")?;

        let check_path = image.clone();
        let blank = tokio::task::spawn_blocking(move || is_blank_raster(&check_path))
            .await
            .context("raster check task failed")??;
        if blank {
            return Ok(String::new());
        }

        self.engine.recognize(&image).await
    }
}

/// Decodes the raster (a corrupt image is an error) and reports whether it is
/// effectively a blank page.
fn is_blank_raster(path: &Path) -> Result<bool> {
    let image = image::open(path)
        .with_context(|| format!("corrupt raster {}", path.display()))?
        .to_luma8();

    if image.width() == 0 || image.height() == 0 {
        anyhow::bail!("empty raster {}", path.display());
    }

    let (min, max) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    Ok(max.saturating_sub(min) < BLANK_CONTRAST_THRESHOLD)
}

const BLANK_CONTRAST_THRESHOLD: u8 = 16;
