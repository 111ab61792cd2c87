use lingua::{Language, LanguageDetectorBuilder};
use once_cell::sync::Lazy;

use crate::models::truncate_chars;

/// Infers the language of extracted text. Only the translate flow uses it.
pub trait LanguageDetector: Send + Sync {
    /// Human-readable language name, e.g. `English`.
    fn detect(&self, text: &str) -> Option<String>;
}

const SAMPLE_CHARS: usize = 2_000;

const SUPPORTED_LANGUAGES: [Language; 16] = [
    Language::Arabic,
    Language::Chinese,
    Language::Dutch,
    Language::English,
    Language::French,
    Language::German,
    Language::Hindi,
    Language::Italian,
    Language::Japanese,
    Language::Korean,
    Language::Polish,
    Language::Portuguese,
    Language::Russian,
    Language::Spanish,
    Language::Turkish,
    Language::Ukrainian,
];

// Model loading is expensive; build once per process.
static DETECTOR: Lazy<lingua::LanguageDetector> =
    Lazy::new(|| LanguageDetectorBuilder::from_languages(&SUPPORTED_LANGUAGES).build());

pub struct LinguaDetector;

impl LinguaDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinguaDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetector for LinguaDetector {
    fn detect(&self, text: &str) -> Option<String> {
        let (sample, _) = truncate_chars(text.trim(), SAMPLE_CHARS);
        if sample.is_empty() {
            return None;
        }

        let detected = DETECTOR.detect_language_of(sample).map(|lang| lang.to_string());
        tracing::debug!(language = ?detected, sample_chars = sample.chars().count(), "Detected source language");
        detected
    }
}
