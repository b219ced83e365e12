//! Recorder settings
//!
//! Per-session options for the camera, screen and voice recorders,
//! persisted as a JSON file.

use crate::recorder::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Environment variable naming the settings file
pub const CONFIG_ENV: &str = "MEDIA_RECORDER_CONFIG";

/// Settings-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Options for every recorder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderSettings {
    pub video: SessionConfig,
    pub screen: SessionConfig,
    pub voice: SessionConfig,
}

impl RecorderSettings {
    /// Read settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        settings.validate()?;

        tracing::debug!("Loaded recorder settings from {:?}", path);
        Ok(settings)
    }

    /// Read settings, falling back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Read settings from the file named by [`CONFIG_ENV`], if set
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_or_default(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Write settings as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;

        tracing::debug!("Saved recorder settings to {:?}", path);
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, config) in [("video", &self.video), ("screen", &self.screen), ("voice", &self.voice)] {
            if let Some(max) = config.max_length() {
                if config.alert_time_before_stop > max {
                    tracing::warn!(
                        "{} alert time {}s exceeds its {}s limit; the warning shows immediately",
                        name,
                        config.alert_time_before_stop,
                        max
                    );
                }
            }
        }
        if let Some(key) = self.video.resolution {
            if crate::capture::resolution::lookup(key).is_none() {
                return Err(ConfigError::Invalid(format!("unknown video resolution {key}")));
            }
        }
        Ok(())
    }
}
