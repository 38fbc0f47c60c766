pub mod config;
pub mod orchestrator;
pub mod state;

pub use config::SessionConfig;
pub use orchestrator::Orchestrator;
pub use state::{
    Difficulty, LogEntry, LogLevel, QaRecord, Rubric, SessionMetrics, SessionState, SessionStatus,
};
