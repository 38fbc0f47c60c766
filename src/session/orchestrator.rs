use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Local;

use crate::capture::{CapturedFrame, FrameSource};
use crate::services::{QuestionGenerator, QuestionRequest, TextRecognizer, Transcriber};
use crate::session::state::{Difficulty, SessionState, SessionStatus};

const FALLBACK_QUESTION: &str =
    "Can you briefly explain the overall architecture of this project (modules + data flow)?";
const FOLLOWUP_PROMPT: &str = "What’s one concrete implementation detail you’re proud of?";

const HIGHLIGHT_MIN_CHARS: usize = 6;
const HIGHLIGHT_MAX_CHARS: usize = 120;
const HIGHLIGHT_LIMIT: usize = 6;
const TRANSCRIPT_TAIL_CHARS: usize = 800;

/// Advances a session by at most one throttled unit of work per subsystem
/// per call. Adapters are injected at construction; the orchestrator owns
/// all substitution policy for their failures.
pub struct Orchestrator {
    frames: Box<dyn FrameSource>,
    recognizer: Option<Box<dyn TextRecognizer>>,
    transcriber: Box<dyn Transcriber>,
    interviewer: Box<dyn QuestionGenerator>,
    frame_path: PathBuf,
}

impl Orchestrator {
    pub fn new(
        frames: Box<dyn FrameSource>,
        recognizer: Option<Box<dyn TextRecognizer>>,
        transcriber: Box<dyn Transcriber>,
        interviewer: Box<dyn QuestionGenerator>,
        frame_path: PathBuf,
    ) -> Self {
        Self {
            frames,
            recognizer,
            transcriber,
            interviewer,
            frame_path,
        }
    }

    /// One tick: capture when the interval elapsed, extract from the fresh
    /// frame, generate a question when the slot is open. Safe to call at any
    /// frequency; the caller drives the cadence.
    pub fn tick(&self, state: &mut SessionState) {
        state.last_tick_ts = Some(now_stamp());

        if state.status != SessionStatus::Running {
            return;
        }

        let interval = Duration::from_millis(state.config.capture_interval_ms);
        if let Some(gate) = state.last_capture_gate {
            if gate.elapsed() < interval {
                return;
            }
        }

        // Re-arm before attempting capture so a failing capture cannot retry
        // faster than the configured interval.
        state.last_capture_gate = Some(Instant::now());

        let frame = match self
            .frames
            .capture(&self.frame_path, Some(state.config.region))
        {
            Ok(frame) => frame,
            Err(err) => {
                state.log_error(format!("screen capture failed: {err:#}"));
                return;
            }
        };

        state.latest_frame_path = frame.path.display().to_string();
        state.latest_frame_ts = Some(now_stamp());
        state.latest_frame_size = Some((frame.width, frame.height));
        state.log_info(format!(
            "captured frame: {} size=({},{})",
            state.latest_frame_path, frame.width, frame.height
        ));

        self.run_extraction(state, &frame);
        self.maybe_generate_question(state);
    }

    fn run_extraction(&self, state: &mut SessionState, frame: &CapturedFrame) {
        let Some(recognizer) = self.recognizer.as_deref() else {
            state.ocr_highlights = vec!["(OCR unavailable)".to_string()];
            return;
        };

        let outcome = recognizer.recognize(&frame.path);
        if let Some(err) = outcome.error {
            // Previous text and highlights stay in place on a failed pass.
            state.log_warn(format!("OCR failed: {err}"));
            return;
        }

        state.metrics.ocr_calls += 1;
        state.metrics.ocr_latency_ms = outcome.latency_ms;
        state.ocr_text = outcome.value;
        state.ocr_highlights = derive_highlights(&state.ocr_text);
    }

    fn maybe_generate_question(&self, state: &mut SessionState) {
        if !state.current_question.is_empty()
            || state.qa_history.len() >= state.config.max_questions
        {
            return;
        }

        let difficulty = next_difficulty(
            state.config.auto_difficulty_ramp,
            state.current_difficulty,
            state.qa_history.len(),
        );
        let request = QuestionRequest {
            model: state.config.llm_model.as_str(),
            temperature: state.config.llm_temperature,
            context: state.ocr_text.as_str(),
            difficulty: difficulty.as_str(),
            question_index: state.qa_history.len() + 1,
            max_questions: state.config.max_questions,
        };
        let outcome = self.interviewer.generate(&request);

        let generated = match outcome.error {
            Some(err) => {
                state.log_error(format!("question generation failed: {err}"));
                None
            }
            None => {
                let question = outcome.value.trim().to_string();
                if question.is_empty() {
                    state.log_error("question generation returned empty text");
                    None
                } else {
                    state.metrics.llm_calls += 1;
                    state.metrics.llm_latency_ms = outcome.latency_ms;
                    Some(question)
                }
            }
        };

        let question = match generated {
            Some(question) => question,
            None => {
                state.log_warn("using fallback question");
                FALLBACK_QUESTION.to_string()
            }
        };

        state.current_difficulty = difficulty;
        state.current_question = question;
        state.followup_queue = vec![FOLLOWUP_PROMPT.to_string()];
    }

    /// Manual transcription: hand in uploaded audio bytes and the transcript
    /// grows when the provider returns text.
    pub fn submit_audio(&self, state: &mut SessionState, audio: &[u8], filename: &str) {
        if audio.is_empty() {
            state.log_warn("no audio bytes provided");
            return;
        }
        if !state.config.stt_enabled {
            state.log_warn("transcription disabled in settings");
            return;
        }

        let outcome = self.transcriber.transcribe(
            audio,
            filename,
            &state.config.stt_provider,
            &state.config.stt_model,
        );

        if let Some(err) = outcome.error {
            state.log_error(format!("transcription failed: {err}"));
            return;
        }

        state.metrics.stt_calls += 1;
        state.metrics.stt_latency_ms = outcome.latency_ms;

        if outcome.value.is_empty() {
            state.log_warn("transcription returned empty text");
            return;
        }

        if !state.transcript.is_empty() {
            state.transcript.push('\n');
        }
        state.transcript.push_str(&outcome.value);
        state.transcript_tail = tail_chars(&state.transcript, TRANSCRIPT_TAIL_CHARS);
        state.last_stt_gate = Some(Instant::now());
        state.log_info(format!(
            "transcription ok ({:.1} ms): +{} chars",
            outcome.latency_ms,
            outcome.value.chars().count()
        ));
    }
}

fn now_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Display lines pulled from raw recognized text: trimmed, at least 6 chars,
/// truncated to 120, first 6 qualifying lines in document order.
fn derive_highlights(text: &str) -> Vec<String> {
    let mut highlights = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.chars().count() >= HIGHLIGHT_MIN_CHARS {
            highlights.push(truncate_chars(line, HIGHLIGHT_MAX_CHARS));
        }
        if highlights.len() >= HIGHLIGHT_LIMIT {
            break;
        }
    }
    highlights
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// The last `max_chars` characters of `text`, never splitting a char.
fn tail_chars(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    text.chars().skip(total - max_chars).collect()
}

fn next_difficulty(ramp_enabled: bool, current: Difficulty, answered: usize) -> Difficulty {
    if !ramp_enabled {
        return current;
    }
    match answered {
        0 | 1 => Difficulty::Easy,
        2 | 3 => Difficulty::Medium,
        _ => Difficulty::Hard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureRegion;
    use crate::services::{ServiceOutcome, OCR_PLACEHOLDER};
    use anyhow::bail;
    use std::cell::{Cell, RefCell};
    use std::path::Path;
    use std::rc::Rc;

    struct FakeFrames {
        calls: Rc<Cell<usize>>,
        fail: bool,
    }

    impl FrameSource for FakeFrames {
        fn capture(
            &self,
            out_path: &Path,
            _region: Option<CaptureRegion>,
        ) -> anyhow::Result<CapturedFrame> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                bail!("no display attached");
            }
            Ok(CapturedFrame {
                path: out_path.to_path_buf(),
                width: 1280,
                height: 720,
            })
        }
    }

    struct ScriptedRecognizer {
        script: RefCell<Vec<ServiceOutcome<String>>>,
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn recognize(&self, _image_path: &Path) -> ServiceOutcome<String> {
            let mut script = self.script.borrow_mut();
            if script.is_empty() {
                ServiceOutcome::ok(String::new(), 1.0)
            } else {
                script.remove(0)
            }
        }
    }

    struct FakeTranscriber {
        outcome: ServiceOutcome<String>,
        calls: Rc<Cell<usize>>,
    }

    impl Transcriber for FakeTranscriber {
        fn transcribe(
            &self,
            _audio: &[u8],
            _filename: &str,
            _provider: &str,
            _model: &str,
        ) -> ServiceOutcome<String> {
            self.calls.set(self.calls.get() + 1);
            self.outcome.clone()
        }
    }

    struct FakeInterviewer {
        outcome: ServiceOutcome<String>,
        calls: Rc<Cell<usize>>,
    }

    impl QuestionGenerator for FakeInterviewer {
        fn generate(&self, _request: &QuestionRequest<'_>) -> ServiceOutcome<String> {
            self.calls.set(self.calls.get() + 1);
            self.outcome.clone()
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        capture_calls: Rc<Cell<usize>>,
        stt_calls: Rc<Cell<usize>>,
        llm_calls: Rc<Cell<usize>>,
    }

    fn harness(
        capture_fails: bool,
        recognizer_script: Option<Vec<ServiceOutcome<String>>>,
        stt_outcome: ServiceOutcome<String>,
        llm_outcome: ServiceOutcome<String>,
    ) -> Harness {
        let capture_calls = Rc::new(Cell::new(0));
        let stt_calls = Rc::new(Cell::new(0));
        let llm_calls = Rc::new(Cell::new(0));

        let recognizer = recognizer_script.map(|script| {
            Box::new(ScriptedRecognizer {
                script: RefCell::new(script),
            }) as Box<dyn TextRecognizer>
        });

        let orchestrator = Orchestrator::new(
            Box::new(FakeFrames {
                calls: capture_calls.clone(),
                fail: capture_fails,
            }),
            recognizer,
            Box::new(FakeTranscriber {
                outcome: stt_outcome,
                calls: stt_calls.clone(),
            }),
            Box::new(FakeInterviewer {
                outcome: llm_outcome,
                calls: llm_calls.clone(),
            }),
            std::env::temp_dir().join("viva-unit-frame.png"),
        );

        Harness {
            orchestrator,
            capture_calls,
            stt_calls,
            llm_calls,
        }
    }

    fn running_state() -> SessionState {
        let mut state = SessionState::new();
        state.config.capture_interval_ms = 0;
        state.start();
        state
    }

    fn ok(text: &str) -> ServiceOutcome<String> {
        ServiceOutcome::ok(text.to_string(), 5.0)
    }

    fn fail(message: &str) -> ServiceOutcome<String> {
        ServiceOutcome::fail(String::new(), 5.0, message)
    }

    #[test]
    fn tick_outside_running_only_stamps_timestamp() {
        let h = harness(false, Some(vec![ok("line of text")]), ok(""), ok("q"));
        let mut state = SessionState::new();
        state.config.capture_interval_ms = 0;

        h.orchestrator.tick(&mut state);

        assert!(state.last_tick_ts.is_some());
        assert_eq!(h.capture_calls.get(), 0);
        assert!(state.ocr_text.is_empty());
        assert!(state.current_question.is_empty());
    }

    #[test]
    fn tick_runs_capture_extraction_and_question() {
        let h = harness(
            false,
            Some(vec![ok(
                "   padded interesting line   \nno\nanother qualifying line",
            )]),
            ok(""),
            ok("What does the tick loop throttle?"),
        );
        let mut state = running_state();

        h.orchestrator.tick(&mut state);

        assert_eq!(h.capture_calls.get(), 1);
        assert_eq!(state.latest_frame_size, Some((1280, 720)));
        assert!(state.latest_frame_ts.is_some());
        assert_eq!(state.metrics.ocr_calls, 1);
        assert_eq!(
            state.ocr_highlights,
            vec![
                "padded interesting line".to_string(),
                "another qualifying line".to_string()
            ]
        );
        assert_eq!(state.current_question, "What does the tick loop throttle?");
        assert_eq!(state.metrics.llm_calls, 1);
        assert_eq!(state.followup_queue.len(), 1);
    }

    #[test]
    fn second_tick_within_interval_is_throttled() {
        let h = harness(false, Some(vec![ok("some recognized text")]), ok(""), ok("q1"));
        let mut state = SessionState::new();
        state.start();

        h.orchestrator.tick(&mut state);
        h.orchestrator.tick(&mut state);

        assert_eq!(h.capture_calls.get(), 1);
    }

    #[test]
    fn failed_capture_rearms_gate_and_aborts_tick() {
        let h = harness(true, Some(vec![ok("text")]), ok(""), ok("q"));
        let mut state = SessionState::new();
        state.start();

        h.orchestrator.tick(&mut state);

        assert_eq!(h.capture_calls.get(), 1);
        assert!(state.last_capture_gate.is_some());
        assert_eq!(state.metrics.ocr_calls, 0);
        assert!(state.current_question.is_empty());
        assert!(state
            .system_log
            .iter()
            .any(|entry| entry.message.contains("screen capture failed")));

        // The failing attempt re-armed the gate, so an immediate retry is
        // throttled.
        h.orchestrator.tick(&mut state);
        assert_eq!(h.capture_calls.get(), 1);
    }

    #[test]
    fn extraction_error_keeps_previous_text_and_highlights() {
        let script = vec![
            ok("first pass line\nsecond very good line"),
            ServiceOutcome::fail(OCR_PLACEHOLDER.to_string(), 2.0, "engine crashed"),
        ];
        let h = harness(false, Some(script), ok(""), ok("q"));
        let mut state = running_state();

        h.orchestrator.tick(&mut state);
        let highlights = state.ocr_highlights.clone();
        assert_eq!(state.metrics.ocr_calls, 1);

        state.last_capture_gate = None;
        h.orchestrator.tick(&mut state);

        assert_eq!(state.metrics.ocr_calls, 1);
        assert_eq!(state.ocr_text, "first pass line\nsecond very good line");
        assert_eq!(state.ocr_highlights, highlights);
        assert!(state
            .system_log
            .iter()
            .any(|entry| entry.message.contains("OCR failed")));
    }

    #[test]
    fn absent_engine_sets_sentinel_highlights() {
        let h = harness(false, None, ok(""), ok("q"));
        let mut state = running_state();

        h.orchestrator.tick(&mut state);

        assert_eq!(state.ocr_highlights, vec!["(OCR unavailable)".to_string()]);
        assert_eq!(state.metrics.ocr_calls, 0);
        assert!(state.ocr_text.is_empty());
    }

    #[test]
    fn llm_error_substitutes_fallback_question() {
        let h = harness(false, None, ok(""), fail("server unreachable"));
        let mut state = running_state();

        h.orchestrator.tick(&mut state);

        assert_eq!(state.current_question, FALLBACK_QUESTION);
        assert_eq!(state.metrics.llm_calls, 0);
        assert_eq!(state.followup_queue.len(), 1);
        assert!(state
            .system_log
            .iter()
            .any(|entry| entry.message.contains("using fallback question")));
    }

    #[test]
    fn empty_generated_question_substitutes_fallback() {
        let h = harness(false, None, ok(""), ok("   "));
        let mut state = running_state();

        h.orchestrator.tick(&mut state);

        assert_eq!(state.current_question, FALLBACK_QUESTION);
        assert_eq!(state.metrics.llm_calls, 0);
    }

    #[test]
    fn pending_question_blocks_another_generation() {
        let h = harness(false, None, ok(""), ok("q"));
        let mut state = running_state();

        h.orchestrator.tick(&mut state);
        assert_eq!(h.llm_calls.get(), 1);

        state.last_capture_gate = None;
        h.orchestrator.tick(&mut state);
        assert_eq!(h.llm_calls.get(), 1);
    }

    #[test]
    fn full_history_blocks_generation() {
        let h = harness(false, None, ok(""), ok("q"));
        let mut state = running_state();
        state.config.max_questions = 0;

        h.orchestrator.tick(&mut state);

        assert!(state.current_question.is_empty());
        assert_eq!(h.llm_calls.get(), 0);
    }

    #[test]
    fn submit_audio_appends_and_recomputes_tail() {
        let h = harness(false, None, ok("hello from the demo"), ok("q"));
        let mut state = running_state();

        h.orchestrator.submit_audio(&mut state, b"RIFF", "clip.wav");
        h.orchestrator.submit_audio(&mut state, b"RIFF", "clip.wav");

        assert_eq!(state.transcript, "hello from the demo\nhello from the demo");
        assert_eq!(state.transcript_tail, state.transcript);
        assert_eq!(state.metrics.stt_calls, 2);
        assert!(state.last_stt_gate.is_some());
    }

    #[test]
    fn submit_audio_skips_empty_bytes_and_disabled_stt() {
        let h = harness(false, None, ok("text"), ok("q"));
        let mut state = running_state();

        h.orchestrator.submit_audio(&mut state, b"", "clip.wav");
        assert_eq!(h.stt_calls.get(), 0);

        state.config.stt_enabled = false;
        h.orchestrator.submit_audio(&mut state, b"RIFF", "clip.wav");
        assert_eq!(h.stt_calls.get(), 0);
        assert!(state.transcript.is_empty());
    }

    #[test]
    fn submit_audio_error_leaves_transcript_untouched() {
        let h = harness(false, None, fail("provider exploded"), ok("q"));
        let mut state = running_state();

        h.orchestrator.submit_audio(&mut state, b"RIFF", "clip.wav");

        assert!(state.transcript.is_empty());
        assert_eq!(state.metrics.stt_calls, 0);
        assert!(state
            .system_log
            .iter()
            .any(|entry| entry.message.contains("transcription failed")));
    }

    #[test]
    fn submit_audio_counts_empty_text_as_a_call() {
        let h = harness(false, None, ok(""), ok("q"));
        let mut state = running_state();

        h.orchestrator.submit_audio(&mut state, b"RIFF", "clip.wav");

        assert_eq!(state.metrics.stt_calls, 1);
        assert!(state.transcript.is_empty());
        assert!(state
            .system_log
            .iter()
            .any(|entry| entry.message.contains("empty text")));
    }

    #[test]
    fn highlights_filter_trim_and_truncate() {
        let long_line = "x".repeat(200);
        let text = format!(
            "  short\nan acceptable line\n{long_line}\n\n  trailing spaces line   \nline6 ok\nline7 ok\nline8 ok"
        );

        let highlights = derive_highlights(&text);

        assert_eq!(highlights.len(), 6);
        assert_eq!(highlights[0], "an acceptable line");
        assert_eq!(highlights[1].chars().count(), 120);
        assert_eq!(highlights[2], "trailing spaces line");
    }

    #[test]
    fn highlights_cap_at_six_lines() {
        let text = (1..=9)
            .map(|i| format!("qualifying line {i}"))
            .collect::<Vec<_>>()
            .join("\n");

        let highlights = derive_highlights(&text);

        assert_eq!(highlights.len(), 6);
        assert_eq!(highlights[5], "qualifying line 6");
    }

    #[test]
    fn tail_respects_multibyte_boundaries() {
        let text = "héllo wörld ".repeat(100);
        let tail = tail_chars(&text, 800);
        assert_eq!(tail.chars().count(), 800);
        assert!(text.ends_with(&tail));
    }

    #[test]
    fn tail_returns_short_text_whole() {
        assert_eq!(tail_chars("short", 800), "short");
    }

    #[test]
    fn difficulty_ramp_follows_history_length() {
        assert_eq!(next_difficulty(true, Difficulty::Hard, 0), Difficulty::Easy);
        assert_eq!(next_difficulty(true, Difficulty::Easy, 1), Difficulty::Easy);
        assert_eq!(next_difficulty(true, Difficulty::Easy, 2), Difficulty::Medium);
        assert_eq!(next_difficulty(true, Difficulty::Easy, 3), Difficulty::Medium);
        assert_eq!(next_difficulty(true, Difficulty::Easy, 4), Difficulty::Hard);
        assert_eq!(next_difficulty(true, Difficulty::Easy, 12), Difficulty::Hard);
    }

    #[test]
    fn disabled_ramp_keeps_current_difficulty() {
        assert_eq!(
            next_difficulty(false, Difficulty::Medium, 9),
            Difficulty::Medium
        );
        assert_eq!(next_difficulty(false, Difficulty::Easy, 0), Difficulty::Easy);
    }
}
