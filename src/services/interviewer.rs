use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use serde_json::{json, Value};

use super::{api_error_message, api_key, elapsed_ms, ServiceOutcome};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are an AI interviewer for a software/ML project demo. \
    Generate ONE concise interview question based on on-screen context. \
    No bullet lists. No multiple questions.";

/// One question-generation request. `context` is the raw recognized
/// on-screen text, passed through unmodified.
#[derive(Debug, Clone)]
pub struct QuestionRequest<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub context: &'a str,
    pub difficulty: &'a str,
    pub question_index: usize,
    pub max_questions: usize,
}

pub trait QuestionGenerator {
    fn generate(&self, request: &QuestionRequest<'_>) -> ServiceOutcome<String>;
}

/// Talks to any OpenAI-compatible chat completions endpoint. Pointing
/// `OPENAI_BASE_URL` at a local server (Ollama, llama.cpp) swaps the backend
/// without code changes.
pub struct OpenAiInterviewer {
    client: Client,
    base_url: String,
}

impl OpenAiInterviewer {
    pub fn new() -> Result<Self> {
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build interviewer http client")?;
        Ok(Self { client, base_url })
    }

    fn request_question(&self, request: &QuestionRequest<'_>) -> Result<String> {
        let key = api_key().ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))?;

        let user_prompt = format!(
            "Difficulty: {}\nQuestion {}/{}\n\nOn-screen OCR context (may be noisy):\n{}\n\n\
             Ask ONE question that tests architecture + implementation detail.",
            request.difficulty, request.question_index, request.max_questions, request.context
        );

        let body = json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt }
            ]
        });

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .with_context(|| format!("question request to {url} failed"))?;

        let status = response.status();
        let body: Value = response.json().context("question response was not json")?;
        if !status.is_success() {
            bail!(
                "question request returned {status}: {}",
                api_error_message(&body)
            );
        }

        Ok(body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string())
    }
}

impl QuestionGenerator for OpenAiInterviewer {
    fn generate(&self, request: &QuestionRequest<'_>) -> ServiceOutcome<String> {
        if api_key().is_none() {
            return ServiceOutcome::fail(String::new(), 0.0, "OPENAI_API_KEY is not set");
        }

        let started = Instant::now();
        match self.request_question(request) {
            Ok(question) => ServiceOutcome::ok(question, elapsed_ms(started)),
            Err(err) => ServiceOutcome::fail(String::new(), elapsed_ms(started), err.to_string()),
        }
    }
}
