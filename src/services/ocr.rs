use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use anyhow::{anyhow, Result};
use log::{debug, warn};
use rusty_tesseract::{Args, Image};

use super::{elapsed_ms, ServiceOutcome};

/// Stored in place of recognized text when the engine cannot produce any.
pub const OCR_PLACEHOLDER: &str = "Content: (OCR unavailable)";

pub trait TextRecognizer {
    /// Never fails hard: internal errors come back inside the outcome, with
    /// the placeholder as the value.
    fn recognize(&self, image_path: &Path) -> ServiceOutcome<String>;
}

/// Tesseract-backed recognizer. rusty_tesseract shells out to the
/// `tesseract` binary, so construction probes for it once and callers treat
/// a missing install as "no engine" instead of a per-tick failure.
pub struct TesseractRecognizer {
    args: Args,
}

impl TesseractRecognizer {
    pub fn detect() -> Option<Self> {
        match Command::new("tesseract").arg("--version").output() {
            Ok(output) if output.status.success() => Some(Self::with_default_args()),
            Ok(output) => {
                warn!("tesseract probe exited with {}", output.status);
                None
            }
            Err(err) => {
                debug!("tesseract binary not found: {err}");
                None
            }
        }
    }

    fn with_default_args() -> Self {
        Self {
            args: Args {
                lang: "eng".to_string(),
                config_variables: HashMap::new(),
                dpi: Some(150),
                psm: Some(3),
                oem: Some(3),
            },
        }
    }

    fn recognize_inner(&self, image_path: &Path) -> Result<String> {
        let frame = image::open(image_path)
            .map_err(|err| anyhow!("failed to open {}: {err}", image_path.display()))?;
        let ocr_image = Image::from_dynamic_image(&frame)
            .map_err(|err| anyhow!("failed to convert frame for tesseract: {err}"))?;
        let text = rusty_tesseract::image_to_string(&ocr_image, &self.args)
            .map_err(|err| anyhow!("tesseract recognition failed: {err}"))?;
        Ok(text.trim().to_string())
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image_path: &Path) -> ServiceOutcome<String> {
        let started = Instant::now();
        match self.recognize_inner(image_path) {
            Ok(text) => ServiceOutcome::ok(text, elapsed_ms(started)),
            Err(err) => ServiceOutcome::fail(
                OCR_PLACEHOLDER.to_string(),
                elapsed_ms(started),
                err.to_string(),
            ),
        }
    }
}
