//! Live media stream and track handles
//!
//! A [`MediaTrack`] is a shared handle to one hardware source. Stopping a
//! track releases the device; a track can also be ended from the outside
//! (device unplugged, the platform's "stop sharing" control), which is the
//! only transition observers are woken for as an external end.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Lifecycle of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    /// Producing media
    Live,
    /// Stopped by its owner
    Stopped,
    /// Ended by the device or the platform
    Ended,
}

/// Settings the device actually applied to a track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
}

struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    settings: TrackSettings,
    state: watch::Sender<TrackState>,
}

/// Shared handle to a single hardware track
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>, settings: TrackSettings) -> Self {
        let (state, _) = watch::channel(TrackState::Live);
        Self {
            inner: Arc::new(TrackInner {
                id: Uuid::new_v4().to_string(),
                kind,
                label: label.into(),
                settings,
                state,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn settings(&self) -> &TrackSettings {
        &self.inner.settings
    }

    pub fn ready_state(&self) -> TrackState {
        *self.inner.state.borrow()
    }

    pub fn is_live(&self) -> bool {
        self.ready_state() == TrackState::Live
    }

    /// Stop the track and release the device.
    ///
    /// Returns false if the track was no longer live.
    pub fn stop(&self) -> bool {
        let stopped = self.transition(TrackState::Stopped);
        if stopped {
            tracing::debug!("Stopped {:?} track '{}'", self.kind(), self.label());
        }
        stopped
    }

    /// End the track from outside its owner.
    pub fn end(&self) -> bool {
        let ended = self.transition(TrackState::Ended);
        if ended {
            tracing::info!("{:?} track '{}' ended externally", self.kind(), self.label());
        }
        ended
    }

    /// Wait until the track leaves the live state.
    ///
    /// Resolves to `true` when the track was ended externally and to
    /// `false` when its owner stopped it.
    pub async fn ended(&self) -> bool {
        let mut rx = self.inner.state.subscribe();
        let externally = match rx.wait_for(|state| *state != TrackState::Live).await {
            Ok(state) => *state == TrackState::Ended,
            Err(_) => false,
        };
        externally
    }

    fn transition(&self, to: TrackState) -> bool {
        self.inner.state.send_if_modified(|state| {
            if *state == TrackState::Live {
                *state = to;
                true
            } else {
                false
            }
        })
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("state", &self.ready_state())
            .finish()
    }
}

/// A set of tracks acquired together
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks,
        }
    }

    /// Build one stream out of the tracks of several streams.
    ///
    /// The tracks are shared, so stopping the mixed stream stops the
    /// sources as well.
    pub fn mixed(streams: &[&MediaStream]) -> Self {
        let tracks = streams
            .iter()
            .flat_map(|stream| stream.tracks.iter().cloned())
            .collect();
        Self::new(tracks)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    /// Whether any track is still live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    /// Stop every track in the stream
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}
