mod preprocess;
mod tesseract;

use anyhow::Result;
use image::DynamicImage;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use tesseract::{TesseractRecognizer, list_tesseract_languages};

/// Shown in place of recognized text when OCR yields nothing.
pub const NO_TEXT_FOUND: &str = "No text found";

/// Language hints passed to OCR unless settings say otherwise.
pub const DEFAULT_LANGUAGES: &[&str] = &["eng", "deu"];

pub type RecognizeFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

pub trait Recognizer: Send + Sync {
    /// The image is shared with the pipeline, so a whole-image request costs
    /// no pixel copy.
    fn recognize(&self, image: Arc<DynamicImage>, languages: &[String]) -> RecognizeFuture;
}

pub fn default_languages() -> Vec<String> {
    DEFAULT_LANGUAGES
        .iter()
        .map(|value| value.to_string())
        .collect()
}

/// Cleans raw engine output. Blank output becomes [`NO_TEXT_FOUND`].
pub fn finalize_text(raw: &str) -> String {
    let lines = raw
        .replace('\u{c}', "")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = lines.trim();
    if trimmed.is_empty() {
        NO_TEXT_FOUND.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_output_becomes_sentinel() {
        assert_eq!(finalize_text(""), NO_TEXT_FOUND);
        assert_eq!(finalize_text("  \n\u{c}\n"), NO_TEXT_FOUND);
    }

    #[test]
    fn keeps_line_structure() {
        let raw = "Er malte die Mona Lisa.   \nWer ist es?\n\n\u{c}";
        assert_eq!(finalize_text(raw), "Er malte die Mona Lisa.\nWer ist es?");
    }
}
