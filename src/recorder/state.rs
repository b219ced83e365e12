//! Recording state management
//!
//! Defines the session state machine, the observable session state and the
//! per-session configuration.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Current state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Stream acquired and previewing, not recording yet
    Streaming,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
}

impl RecordingState {
    /// Recording or paused
    pub fn is_capturing(self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }
}

/// Observable state of a session
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: RecordingState,
    pub is_recording: bool,
    pub is_paused: bool,
    pub permission_denied: bool,
    pub elapsed_seconds: u64,
    #[serde(skip)]
    pub recorded_blob: Option<Arc<[u8]>>,
    /// Empty when nothing has been recorded
    pub recorded_url: String,
    pub will_stop_soon: bool,
    /// Whether a device stream is currently held
    pub has_stream: bool,
}

/// Per-session options fixed at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Automatic stop after this many seconds
    pub max_record_length: Option<u64>,

    /// Seconds before the automatic stop at which the session warns
    pub alert_time_before_stop: u64,

    /// Resolution table key for camera capture
    pub resolution: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_record_length: None,
            alert_time_before_stop: 10,
            resolution: None,
        }
    }
}

impl SessionConfig {
    pub fn with_max_record_length(mut self, seconds: u64) -> Self {
        self.max_record_length = Some(seconds);
        self
    }

    pub fn with_alert_time_before_stop(mut self, seconds: u64) -> Self {
        self.alert_time_before_stop = seconds;
        self
    }

    pub fn with_resolution(mut self, key: u32) -> Self {
        self.resolution = Some(key);
        self
    }

    /// Configured maximum length; zero means unlimited
    pub fn max_length(&self) -> Option<u64> {
        self.max_record_length.filter(|max| *max > 0)
    }

    /// Seconds left before the automatic stop
    pub fn remaining(&self, elapsed: u64) -> Option<u64> {
        self.max_length().map(|max| max.saturating_sub(elapsed))
    }

    /// Whether the stopping-soon warning applies at `elapsed`
    pub fn in_warning_window(&self, elapsed: u64) -> bool {
        self.remaining(elapsed)
            .is_some_and(|remaining| remaining <= self.alert_time_before_stop)
    }

    /// Whether the recording must stop at `elapsed`
    pub fn limit_reached(&self, elapsed: u64) -> bool {
        self.max_length().is_some_and(|max| elapsed >= max)
    }
}
