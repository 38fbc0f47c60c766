use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{multipart, Client};
use serde_json::Value;

use super::{api_error_message, api_key, elapsed_ms, ServiceOutcome};

const OPENAI_TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEFAULT_WHISPER_SERVER_URL: &str = "http://127.0.0.1:8080/inference";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub trait Transcriber {
    fn transcribe(
        &self,
        audio: &[u8],
        filename: &str,
        provider: &str,
        model: &str,
    ) -> ServiceOutcome<String>;
}

/// Sends uploaded audio to the selected transcription backend.
///
/// Providers: "openai" posts to the hosted transcriptions API,
/// "whisper-server" posts to a local whisper HTTP server
/// (`WHISPER_SERVER_URL` overrides the default endpoint), "none" reports the
/// subsystem as disabled.
pub struct SpeechTranscriber {
    client: Client,
}

impl SpeechTranscriber {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build transcription http client")?;
        Ok(Self { client })
    }

    fn transcribe_openai(&self, audio: &[u8], filename: &str, model: &str) -> Result<String> {
        let key = api_key().ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))?;
        let form = multipart::Form::new()
            .text("model", model.to_string())
            .part("file", audio_part(audio, filename)?);

        let response = self
            .client
            .post(OPENAI_TRANSCRIPTIONS_URL)
            .bearer_auth(key)
            .multipart(form)
            .send()
            .context("transcription request failed")?;

        let status = response.status();
        let body: Value = response
            .json()
            .context("transcription response was not json")?;
        if !status.is_success() {
            bail!(
                "transcription request returned {status}: {}",
                api_error_message(&body)
            );
        }

        Ok(extract_text(&body))
    }

    fn transcribe_whisper_server(&self, audio: &[u8], filename: &str) -> Result<String> {
        let url = std::env::var("WHISPER_SERVER_URL")
            .unwrap_or_else(|_| DEFAULT_WHISPER_SERVER_URL.to_string());
        let form = multipart::Form::new()
            .text("response_format", "json")
            .part("file", audio_part(audio, filename)?);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .with_context(|| format!("whisper server request to {url} failed"))?;

        let status = response.status();
        let body: Value = response
            .json()
            .context("whisper server response was not json")?;
        if !status.is_success() {
            bail!("whisper server returned {status}: {}", api_error_message(&body));
        }

        Ok(extract_text(&body))
    }
}

impl Transcriber for SpeechTranscriber {
    fn transcribe(
        &self,
        audio: &[u8],
        filename: &str,
        provider: &str,
        model: &str,
    ) -> ServiceOutcome<String> {
        if provider == "none" {
            return ServiceOutcome::fail(String::new(), 0.0, "transcription provider disabled");
        }
        if provider == "openai" && api_key().is_none() {
            return ServiceOutcome::fail(String::new(), 0.0, "OPENAI_API_KEY is not set");
        }

        let started = Instant::now();
        let result = match provider {
            "openai" => self.transcribe_openai(audio, filename, model),
            "whisper-server" => self.transcribe_whisper_server(audio, filename),
            other => Err(anyhow!("unknown transcription provider: {other}")),
        };

        match result {
            Ok(text) => ServiceOutcome::ok(text, elapsed_ms(started)),
            Err(err) => ServiceOutcome::fail(String::new(), elapsed_ms(started), err.to_string()),
        }
    }
}

fn audio_part(audio: &[u8], filename: &str) -> Result<multipart::Part> {
    multipart::Part::bytes(audio.to_vec())
        .file_name(filename.to_string())
        .mime_str(guess_audio_mime(filename))
        .context("invalid audio mime type")
}

fn guess_audio_mime(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        _ => "audio/wav",
    }
}

fn extract_text(body: &Value) -> String {
    body["text"].as_str().unwrap_or("").trim().to_string()
}
