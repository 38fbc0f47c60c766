use serde::{Deserialize, Serialize};

use crate::capture::CaptureRegion;

/// Session knobs. These survive `reset_runtime`; only `reset_all` puts them
/// back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub region: CaptureRegion,
    pub capture_interval_ms: u64,

    pub stt_enabled: bool,
    /// "openai" | "whisper-server" | "none"
    pub stt_provider: String,
    pub stt_model: String,

    pub max_questions: usize,
    pub auto_difficulty_ramp: bool,

    pub llm_model: String,
    pub llm_temperature: f32,

    /// Cadence the external driver is expected to tick at.
    pub refresh_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            region: CaptureRegion::default(),
            capture_interval_ms: 2_000,
            stt_enabled: true,
            stt_provider: "openai".into(),
            stt_model: "gpt-4o-mini-transcribe".into(),
            max_questions: 6,
            auto_difficulty_ramp: true,
            llm_model: "gpt-4o-mini".into(),
            llm_temperature: 0.25,
            refresh_interval_ms: 1_250,
        }
    }
}
