use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Local};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::session::config::SessionConfig;

/// Log entries kept when a runtime reset truncates the session log.
const RUNTIME_LOG_KEEP: usize = 80;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Idle
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Easy
    }
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    fn new(level: LogLevel, message: String) -> Self {
        Self {
            at: Local::now(),
            level,
            message,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QaRecord {
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
    pub asked_at: DateTime<Local>,
}

/// Four running interview scores, each 0.0 to 5.0.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rubric {
    pub technical_depth: f64,
    pub clarity: f64,
    pub originality: f64,
    pub implementation: f64,
}

/// Call counters and last-call latencies per external subsystem.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub ocr_calls: u64,
    pub stt_calls: u64,
    pub llm_calls: u64,
    pub ocr_latency_ms: f64,
    pub stt_latency_ms: f64,
    pub llm_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Knobs that survive `reset_runtime`.
    pub config: SessionConfig,

    pub status: SessionStatus,
    pub session_id: String,
    pub last_tick_ts: Option<String>,

    pub latest_frame_path: String,
    pub latest_frame_ts: Option<String>,
    pub latest_frame_size: Option<(u32, u32)>,

    pub ocr_text: String,
    pub ocr_highlights: Vec<String>,

    pub transcript: String,
    pub transcript_tail: String,

    pub current_question: String,
    pub current_difficulty: Difficulty,
    pub followup_queue: Vec<String>,
    pub qa_history: Vec<QaRecord>,

    pub project_memory: String,
    pub rubric: Rubric,
    pub metrics: SessionMetrics,

    pub system_log: Vec<LogEntry>,

    /// Monotonic throttle gates; wall-clock changes must never affect these.
    #[serde(skip)]
    pub last_capture_gate: Option<Instant>,
    #[serde(skip)]
    pub last_stt_gate: Option<Instant>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            status: SessionStatus::Idle,
            session_id: String::new(),
            last_tick_ts: None,
            latest_frame_path: String::new(),
            latest_frame_ts: None,
            latest_frame_size: None,
            ocr_text: String::new(),
            ocr_highlights: Vec::new(),
            transcript: String::new(),
            transcript_tail: String::new(),
            current_question: String::new(),
            current_difficulty: Difficulty::Easy,
            followup_queue: Vec::new(),
            qa_history: Vec::new(),
            project_memory: String::new(),
            rubric: Rubric::default(),
            metrics: SessionMetrics::default(),
            system_log: Vec::new(),
            last_capture_gate: None,
            last_stt_gate: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.reset_runtime();
        self.session_id = format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"));
        self.status = SessionStatus::Running;
        self.log_info("session started");
    }

    /// Toggles between Running and Paused; no-op from Idle or Stopped.
    pub fn pause_resume(&mut self) {
        match self.status {
            SessionStatus::Running => {
                self.status = SessionStatus::Paused;
                self.log_info("session paused");
            }
            SessionStatus::Paused => {
                self.status = SessionStatus::Running;
                self.log_info("session resumed");
            }
            SessionStatus::Idle | SessionStatus::Stopped => {}
        }
    }

    pub fn stop(&mut self) {
        self.status = SessionStatus::Stopped;
        self.log_info("session stopped");
    }

    pub fn clear(&mut self) {
        self.reset_runtime();
        self.log_info("cleared runtime state");
    }

    /// Moves the pending question into history with the subject's answer,
    /// re-opening the question slot for the next tick.
    pub fn submit_answer(&mut self, answer: &str) {
        if self.current_question.is_empty() {
            self.log_warn("no pending question to answer");
            return;
        }

        let record = QaRecord {
            question: std::mem::take(&mut self.current_question),
            answer: answer.trim().to_string(),
            difficulty: self.current_difficulty,
            asked_at: Local::now(),
        };
        self.qa_history.push(record);
        self.followup_queue.clear();
        self.log_info(format!(
            "answer recorded for question {}",
            self.qa_history.len()
        ));
    }

    /// Clears per-session runtime fields but keeps config knobs. The session
    /// log keeps only its most recent entries.
    pub fn reset_runtime(&mut self) {
        let config = self.config.clone();
        let mut log = std::mem::take(&mut self.system_log);
        if log.len() > RUNTIME_LOG_KEEP {
            log.drain(..log.len() - RUNTIME_LOG_KEEP);
        }

        *self = Self::default();
        self.config = config;
        self.system_log = log;
    }

    /// Clears everything, config included.
    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    /// The most recent `limit` log entries, oldest first.
    pub fn recent_log(&self, limit: usize) -> &[LogEntry] {
        let skip = self.system_log.len().saturating_sub(limit);
        &self.system_log[skip..]
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.push_log(LogLevel::Info, message.into());
    }

    pub fn log_warn(&mut self, message: impl Into<String>) {
        self.push_log(LogLevel::Warn, message.into());
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.push_log(LogLevel::Error, message.into());
    }

    // Session log lines mirror into the process log.
    fn push_log(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => info!("{message}"),
            LogLevel::Warn => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }
        self.system_log.push(LogEntry::new(level, message));
    }
}
