//! Stream recorder backend
//!
//! Defines the interface to the component that turns a live
//! [`MediaStream`] into a finished recording. Sessions only talk to
//! recorders through these traits.

use crate::capture::MediaStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recording-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Recorder is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: RecorderState,
        actual: RecorderState,
    },

    #[error("Stream has no live tracks")]
    InactiveStream,

    #[error("Failed to finalize recording: {0}")]
    Finalize(String),
}

pub type RecorderResult<T> = Result<T, RecorderError>;

/// Media kind produced by a recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// State of a recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// Bound to a stream, not capturing
    Inactive,
    Recording,
    Paused,
    /// Finalized
    Stopped,
}

/// Container and codec settings for a recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderOptions {
    pub kind: MediaKind,
    pub mime_type: String,
    pub audio_channels: u16,
}

impl RecorderOptions {
    /// VP9 in WebM, mono audio
    pub fn webm_video() -> Self {
        Self {
            kind: MediaKind::Video,
            mime_type: "video/webm;codecs=vp9".to_string(),
            audio_channels: 1,
        }
    }

    /// Mono WAV
    pub fn wav_audio() -> Self {
        Self {
            kind: MediaKind::Audio,
            mime_type: "audio/wav".to_string(),
            audio_channels: 1,
        }
    }
}

/// Finalized output of a recorder
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMedia {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub duration_secs: f64,
}

/// A recorder bound to one stream
#[async_trait]
pub trait StreamRecorder: Send + Sync {
    async fn start(&self) -> RecorderResult<()>;

    async fn pause(&self) -> RecorderResult<()>;

    async fn resume(&self) -> RecorderResult<()>;

    /// Finalize the recording; the recorder cannot be restarted afterwards
    async fn stop(&self) -> RecorderResult<RecordedMedia>;

    fn state(&self) -> RecorderState;
}

/// Creates recorders bound to streams
pub trait RecorderFactory: Send + Sync {
    fn create(&self, stream: &MediaStream, options: &RecorderOptions) -> RecorderResult<Box<dyn StreamRecorder>>;
}
