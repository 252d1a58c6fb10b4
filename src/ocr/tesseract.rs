use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, warn};

use super::preprocess::preprocess_for_ocr;
use super::{RecognizeFuture, Recognizer};

/// Runs the `tesseract` binary on a temporary PNG.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    psm: u32,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self { psm: 6 }
    }
}

impl TesseractRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_psm(mut self, psm: u32) -> Self {
        self.psm = psm;
        self
    }
}

impl Recognizer for TesseractRecognizer {
    fn recognize(&self, image: Arc<DynamicImage>, languages: &[String]) -> RecognizeFuture {
        let psm = self.psm;
        let languages = languages.to_vec();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || recognize_blocking(&image, &languages, psm))
                .await
                .with_context(|| "OCR task failed")?
        })
    }
}

fn recognize_blocking(image: &DynamicImage, languages: &[String], psm: u32) -> Result<String> {
    let languages = normalize_ocr_languages(languages)?;
    let prepared = preprocess_for_ocr(image);
    let mut tmp = tempfile::Builder::new()
        .prefix("riddle-ocr-")
        .suffix(".png")
        .tempfile()
        .with_context(|| "failed to create temp file for OCR")?;
    prepared
        .write_to(&mut tmp, image::ImageFormat::Png)
        .with_context(|| "failed to write temp image for OCR")?;
    tmp.flush().ok();
    debug!(languages = %languages, psm, "running tesseract");
    run_tesseract_text(tmp.path(), &languages, psm)
}

pub fn list_tesseract_languages() -> Result<Vec<String>> {
    let output = Command::new("tesseract")
        .arg("--list-langs")
        .output()
        .with_context(|| "failed to run tesseract --list-langs")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
    }
    Ok(parse_language_list(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_ocr_languages(requested: &[String]) -> Result<String> {
    let requested = split_languages(requested);
    if requested.is_empty() {
        return Err(anyhow!("ocr languages is empty"));
    }
    match list_tesseract_languages() {
        Ok(available) => select_languages(&requested, &available),
        Err(_) => Ok(requested.join("+")),
    }
}

fn split_languages(requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .flat_map(|raw| raw.split(['+', ',', ' ']))
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
        .collect()
}

fn select_languages(requested: &[String], available: &[String]) -> Result<String> {
    let (chosen, missing): (Vec<_>, Vec<_>) = requested
        .iter()
        .cloned()
        .partition(|lang| available.contains(lang));

    if chosen.is_empty() {
        return Err(anyhow!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        );
    }
    Ok(chosen.join("+"))
}

fn run_tesseract_text(path: &Path, languages: &str, psm: u32) -> Result<String> {
    let output = Command::new("tesseract")
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .arg("--oem")
        .arg("1")
        .arg("--psm")
        .arg(psm.to_string())
        .output()
        .with_context(|| "failed to run tesseract (is it installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn language_list_skips_header() {
        let stdout = "List of available languages in \"/usr/share/tessdata/\" (3):\ndeu\neng\nosd\n";
        assert_eq!(parse_language_list(stdout), langs(&["deu", "eng", "osd"]));
    }

    #[test]
    fn hints_accept_mixed_separators() {
        assert_eq!(
            split_languages(&langs(&["eng+deu", " fra, ita "])),
            langs(&["eng", "deu", "fra", "ita"])
        );
    }

    #[test]
    fn unavailable_languages_are_dropped() {
        let selected = select_languages(&langs(&["eng", "deu", "jpn"]), &langs(&["deu", "eng"]));
        assert_eq!(selected.unwrap(), "eng+deu");
    }

    #[test]
    fn no_available_language_is_an_error() {
        let err = select_languages(&langs(&["jpn"]), &langs(&["eng"])).unwrap_err();
        assert!(err.to_string().contains("not available: jpn"));
    }
}
