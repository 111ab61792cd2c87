use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Artifact, ArtifactKind, ArtifactOutcome, ArtifactSet};
use crate::services::result_store::ResultStore;

// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const FONT_SIZE: i64 = 11;
const LEADING: i64 = 14;
const WRAP_COLUMNS: usize = 90;

/// Turns generated text into the bytes of one artifact kind.
pub trait ArtifactRenderer: Send + Sync {
    fn kind(&self) -> ArtifactKind;

    fn render(&self, text: &str) -> AppResult<Vec<u8>>;
}

/// Exact UTF-8 bytes of the text.
pub struct TextRenderer;

impl ArtifactRenderer for TextRenderer {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Txt
    }

    fn render(&self, text: &str) -> AppResult<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }
}

/// Reflows text into a paginated Helvetica document.
pub struct PdfRenderer {
    wrap_columns: usize,
    lines_per_page: usize,
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self {
            wrap_columns: WRAP_COLUMNS,
            lines_per_page: ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize,
        }
    }
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactRenderer for PdfRenderer {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Pdf
    }

    /// Fails when most of the text cannot be shown in WinAnsi Helvetica,
    /// e.g. a translation into a non-Latin script.
    fn render(&self, text: &str) -> AppResult<Vec<u8>> {
        let (visible, unmappable) = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .fold((0usize, 0usize), |(visible, unmappable), c| {
                (visible + 1, unmappable + usize::from(win_ansi_byte(c).is_none()))
            });
        if unmappable * 2 > visible {
            return Err(AppError::ArtifactGeneration {
                message: format!(
                    "{} of {} characters are outside the PDF font's character set",
                    unmappable, visible
                ),
            });
        }

        let lines = wrap_text(text, self.wrap_columns);
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        // An empty result still gets one (blank) page.
        let chunks: Vec<&[String]> = if lines.is_empty() {
            vec![lines.as_slice()]
        } else {
            lines.chunks(self.lines_per_page.max(1)).collect()
        };

        for chunk in chunks {
            let mut operations = Vec::with_capacity(chunk.len() * 5);
            for (row, line) in chunk.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let y = PAGE_HEIGHT - MARGIN - (row as i64 + 1) * LEADING;
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
                operations.push(Operation::new("Td", vec![MARGIN.into(), y.into()]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(to_win_ansi(line))]));
                operations.push(Operation::new("ET", vec![]));
            }

            let content = Content { operations }.encode().map_err(pdf_error)?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).map_err(pdf_error)?;
        Ok(buffer)
    }
}

/// Renders generated text into the downloadable formats.
pub struct ArtifactGenerator {
    txt: Arc<dyn ArtifactRenderer>,
    pdf: Arc<dyn ArtifactRenderer>,
}

/// What a request ended up with, per kind.
#[derive(Debug)]
pub struct GeneratedArtifacts {
    pub txt: Result<Artifact, String>,
    pub pdf: Result<Artifact, String>,
}

impl GeneratedArtifacts {
    pub fn outcomes(&self) -> ArtifactSet {
        ArtifactSet {
            txt: outcome(&self.txt),
            pdf: outcome(&self.pdf),
        }
    }

    pub fn stored(&self) -> Vec<&Artifact> {
        [&self.txt, &self.pdf]
            .into_iter()
            .filter_map(|r| r.as_ref().ok())
            .collect()
    }
}

fn outcome(result: &Result<Artifact, String>) -> ArtifactOutcome {
    match result {
        Ok(artifact) => ArtifactOutcome::from(artifact),
        Err(reason) => ArtifactOutcome::Failed {
            reason: reason.clone(),
        },
    }
}

impl ArtifactGenerator {
    pub fn new() -> Self {
        Self {
            txt: Arc::new(TextRenderer),
            pdf: Arc::new(PdfRenderer::new()),
        }
    }

    /// Replaces the renderer for `renderer.kind()`.
    pub fn with_renderer(mut self, renderer: Arc<dyn ArtifactRenderer>) -> Self {
        match renderer.kind() {
            ArtifactKind::Txt => self.txt = renderer,
            ArtifactKind::Pdf => self.pdf = renderer,
        }
        self
    }

    pub fn render_txt(&self, text: &str) -> AppResult<Vec<u8>> {
        self.txt.render(text)
    }

    pub fn render_pdf(&self, text: &str) -> AppResult<Vec<u8>> {
        self.pdf.render(text)
    }

    /// Renders and stores both kinds independently. A rendering failure only
    /// marks that kind as unavailable; a storage failure is fatal and removes
    /// whatever this request already wrote.
    pub async fn materialize(
        &self,
        text: &str,
        store: &ResultStore,
        request_id: Uuid,
    ) -> AppResult<GeneratedArtifacts> {
        let mut generated = GeneratedArtifacts {
            txt: Err("not generated".to_string()),
            pdf: Err("not generated".to_string()),
        };

        for kind in ArtifactKind::ALL {
            let rendered = match kind {
                ArtifactKind::Txt => self.render_txt(text),
                ArtifactKind::Pdf => self.render_pdf(text),
            };

            let slot = match kind {
                ArtifactKind::Txt => &mut generated.txt,
                ArtifactKind::Pdf => &mut generated.pdf,
            };

            match rendered {
                Ok(bytes) => match store.put(kind, &bytes, request_id).await {
                    Ok(artifact) => *slot = Ok(artifact),
                    Err(e) => {
                        let written: Vec<Artifact> = generated.stored().into_iter().cloned().collect();
                        store.discard(&written).await;
                        return Err(e);
                    }
                },
                Err(e) => {
                    warn!(request_id = %request_id, kind = kind.extension(), error = %e, "Artifact rendering failed");
                    *slot = Err(e.to_string());
                }
            }
        }

        if generated.txt.is_err() && generated.pdf.is_err() {
            return Err(AppError::ArtifactGeneration {
                message: "neither the text nor the PDF artifact could be produced".to_string(),
            });
        }

        info!(
            request_id = %request_id,
            txt = generated.txt.is_ok(),
            pdf = generated.pdf.is_ok(),
            "Artifacts generated"
        );
        Ok(generated)
    }
}

impl Default for ArtifactGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn pdf_error(e: impl std::fmt::Display) -> AppError {
    AppError::ArtifactGeneration {
        message: format!("PDF rendering failed: {}", e),
    }
}

/// Greedy word wrap. Paragraph breaks are kept as empty lines; words longer
/// than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
            if needed > width && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        lines.push(current);
    }

    while lines.last().map_or(false, |l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Latin-1 byte for the standard Helvetica encoding, if there is one.
fn win_ansi_byte(c: char) -> Option<u8> {
    match c {
        '\u{2018}' | '\u{2019}' => Some(b'\''),
        '\u{201C}' | '\u{201D}' => Some(b'"'),
        '\u{2013}' | '\u{2014}' => Some(b'-'),
        c if (c as u32) < 0x20 => Some(b' '),
        c if (c as u32) <= 0xFF => Some(c as u32 as u8),
        _ => None,
    }
}

/// Anything without a WinAnsi byte becomes `?`.
fn to_win_ansi(line: &str) -> Vec<u8> {
    line.chars().map(|c| win_ansi_byte(c).unwrap_or(b'?')).collect()
}
