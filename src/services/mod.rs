pub mod interviewer;
pub mod ocr;
pub mod stt;

pub use interviewer::{OpenAiInterviewer, QuestionGenerator, QuestionRequest};
pub use ocr::{TesseractRecognizer, TextRecognizer, OCR_PLACEHOLDER};
pub use stt::{SpeechTranscriber, Transcriber};

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What one external call produced: the value, how long the call took, and
/// the error message when it failed. Substitution policy for failed calls
/// belongs to the caller, not the adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOutcome<T> {
    pub value: T,
    pub latency_ms: f64,
    pub error: Option<String>,
}

impl<T> ServiceOutcome<T> {
    pub fn ok(value: T, latency_ms: f64) -> Self {
        Self {
            value,
            latency_ms,
            error: None,
        }
    }

    pub fn fail(value: T, latency_ms: f64, error: impl Into<String>) -> Self {
        Self {
            value,
            latency_ms,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

pub(crate) fn api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|key| !key.is_empty())
}

/// Best-effort extraction of the error shape OpenAI-style APIs return.
pub(crate) fn api_error_message(body: &Value) -> String {
    body["error"]["message"]
        .as_str()
        .or_else(|| body["error"].as_str())
        .unwrap_or("no error detail")
        .to_string()
}
