use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use viva::capture::OsScreenCapture;
use viva::services::{OpenAiInterviewer, SpeechTranscriber, TesseractRecognizer, TextRecognizer};
use viva::settings::{default_settings_path, frames_dir, SettingsStore};
use viva::{Orchestrator, SessionState};

fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("viva starting up...");

    let store = SettingsStore::new(default_settings_path());
    let config = store.load()?;

    let recognizer: Option<Box<dyn TextRecognizer>> = match TesseractRecognizer::detect() {
        Some(engine) => Some(Box::new(engine)),
        None => {
            log::warn!("tesseract not found; OCR disabled for this run");
            None
        }
    };

    let orchestrator = Orchestrator::new(
        Box::new(OsScreenCapture),
        recognizer,
        Box::new(SpeechTranscriber::new()?),
        Box::new(OpenAiInterviewer::new()?),
        frames_dir().join("latest_frame.png"),
    );

    let mut state = SessionState::new();
    state.config = config;

    let run_secs = std::env::var("VIVA_RUN_SECS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(30);

    state.start();

    // Optional pre-recorded answer audio, transcribed once at startup.
    if let Ok(path) = std::env::var("VIVA_AUDIO_FILE") {
        let audio =
            fs::read(&path).with_context(|| format!("Failed to read audio file {path}"))?;
        let filename = Path::new(&path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.wav");
        orchestrator.submit_audio(&mut state, &audio, filename);
    }

    let deadline = Instant::now() + Duration::from_secs(run_secs);
    while Instant::now() < deadline {
        orchestrator.tick(&mut state);
        thread::sleep(Duration::from_millis(state.config.refresh_interval_ms));
    }

    state.stop();

    println!("{}", serde_json::to_string_pretty(&state)?);
    store.save(&state.config)?;

    Ok(())
}
