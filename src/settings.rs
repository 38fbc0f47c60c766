use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::session::SessionConfig;

/// Loads and persists session configuration as pretty JSON on disk.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Reads the stored config; a missing or malformed file yields defaults.
    pub fn load(&self) -> Result<SessionConfig> {
        if !self.path.exists() {
            return Ok(SessionConfig::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        Ok(serde_json::from_str(&contents).unwrap_or_default())
    }

    pub fn save(&self, config: &SessionConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings dir {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn default_settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("viva"))
        .unwrap_or_else(|| PathBuf::from(".").join("viva"))
}

pub fn frames_dir() -> PathBuf {
    data_dir().join("frames")
}
