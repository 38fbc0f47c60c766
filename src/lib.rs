pub mod capture;
pub mod services;
pub mod session;
pub mod settings;

pub use session::{Orchestrator, SessionConfig, SessionState};
