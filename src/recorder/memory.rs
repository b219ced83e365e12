//! In-memory recorder
//!
//! Tracks active capture segments on the tokio clock and finalizes into a
//! JSON manifest describing what was recorded. Encoding real media is left
//! to platform recorders plugged in through [`RecorderFactory`].

use super::backend::{
    RecordedMedia, RecorderError, RecorderFactory, RecorderOptions, RecorderResult, RecorderState,
    StreamRecorder,
};
use crate::capture::{MediaStream, MediaTrack, TrackKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;

/// One track in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestTrack {
    pub kind: TrackKind,
    pub label: String,
}

/// One uninterrupted capture span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSegment {
    /// Offset from recorder start in milliseconds
    pub start_ms: u64,
    pub duration_ms: u64,
}

/// Body of a finalized in-memory recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingManifest {
    pub mime_type: String,
    pub audio_channels: u16,
    pub tracks: Vec<ManifestTrack>,
    pub segments: Vec<ManifestSegment>,
    pub duration_secs: f64,
}

struct MemoryState {
    state: RecorderState,
    started_at: Option<Instant>,
    segment_start: Option<Instant>,
    segments: Vec<ManifestSegment>,
}

/// Recorder that keeps its output in memory
pub struct MemoryRecorder {
    options: RecorderOptions,
    tracks: Vec<MediaTrack>,
    inner: Mutex<MemoryState>,
}

impl MemoryRecorder {
    pub fn new(stream: &MediaStream, options: RecorderOptions) -> Self {
        Self {
            options,
            tracks: stream.tracks().to_vec(),
            inner: Mutex::new(MemoryState {
                state: RecorderState::Inactive,
                started_at: None,
                segment_start: None,
                segments: Vec::new(),
            }),
        }
    }

    fn expect_state(inner: &MemoryState, expected: RecorderState) -> RecorderResult<()> {
        if inner.state != expected {
            return Err(RecorderError::InvalidState {
                expected,
                actual: inner.state,
            });
        }
        Ok(())
    }

    fn close_segment(inner: &mut MemoryState, now: Instant) {
        if let (Some(started), Some(segment_start)) = (inner.started_at, inner.segment_start.take()) {
            inner.segments.push(ManifestSegment {
                start_ms: (segment_start - started).as_millis() as u64,
                duration_ms: (now - segment_start).as_millis() as u64,
            });
        }
    }
}

#[async_trait]
impl StreamRecorder for MemoryRecorder {
    async fn start(&self) -> RecorderResult<()> {
        let mut inner = self.inner.lock();
        Self::expect_state(&inner, RecorderState::Inactive)?;
        if !self.tracks.iter().any(MediaTrack::is_live) {
            return Err(RecorderError::InactiveStream);
        }

        let now = Instant::now();
        inner.started_at = Some(now);
        inner.segment_start = Some(now);
        inner.state = RecorderState::Recording;
        tracing::debug!("Memory recorder started ({})", self.options.mime_type);
        Ok(())
    }

    async fn pause(&self) -> RecorderResult<()> {
        let mut inner = self.inner.lock();
        Self::expect_state(&inner, RecorderState::Recording)?;
        Self::close_segment(&mut inner, Instant::now());
        inner.state = RecorderState::Paused;
        Ok(())
    }

    async fn resume(&self) -> RecorderResult<()> {
        let mut inner = self.inner.lock();
        Self::expect_state(&inner, RecorderState::Paused)?;
        inner.segment_start = Some(Instant::now());
        inner.state = RecorderState::Recording;
        Ok(())
    }

    async fn stop(&self) -> RecorderResult<RecordedMedia> {
        let mut inner = self.inner.lock();
        if !matches!(inner.state, RecorderState::Recording | RecorderState::Paused) {
            return Err(RecorderError::InvalidState {
                expected: RecorderState::Recording,
                actual: inner.state,
            });
        }
        Self::close_segment(&mut inner, Instant::now());
        inner.state = RecorderState::Stopped;

        let total_ms: u64 = inner.segments.iter().map(|s| s.duration_ms).sum();
        let manifest = RecordingManifest {
            mime_type: self.options.mime_type.clone(),
            audio_channels: self.options.audio_channels,
            tracks: self
                .tracks
                .iter()
                .map(|track| ManifestTrack {
                    kind: track.kind(),
                    label: track.label().to_string(),
                })
                .collect(),
            segments: inner.segments.clone(),
            duration_secs: total_ms as f64 / 1000.0,
        };
        let data = serde_json::to_vec(&manifest).map_err(|e| RecorderError::Finalize(e.to_string()))?;

        Ok(RecordedMedia {
            data,
            mime_type: manifest.mime_type,
            duration_secs: manifest.duration_secs,
        })
    }

    fn state(&self) -> RecorderState {
        self.inner.lock().state
    }
}

/// Factory for [`MemoryRecorder`]s
#[derive(Default)]
pub struct MemoryRecorderFactory {
    created: AtomicUsize,
}

impl MemoryRecorderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorders created so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RecorderFactory for MemoryRecorderFactory {
    fn create(&self, stream: &MediaStream, options: &RecorderOptions) -> RecorderResult<Box<dyn StreamRecorder>> {
        if !stream.is_active() {
            return Err(RecorderError::InactiveStream);
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryRecorder::new(stream, options.clone())))
    }
}
