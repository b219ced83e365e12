//! In-process capture devices
//!
//! A scriptable [`MediaDevices`] implementation: permission grants, prompt
//! answers and acquisition failures are set by the caller, every track
//! handed out is remembered, and acquisitions can be held in flight to
//! exercise late-arriving streams.

use super::stream::{MediaStream, MediaTrack, TrackKind, TrackSettings};
use super::traits::{
    CaptureError, CaptureResult, DisplayMediaConstraints, MediaDevices, MediaStreamConstraints,
    PermissionName, PermissionState,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::sync::watch;

const DEFAULT_CAMERA: (u32, u32) = (1280, 720);
const DEFAULT_DISPLAY: (u32, u32) = (1920, 1080);

/// How the simulated user answers a permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResponse {
    Accept,
    Deny,
}

struct VirtualState {
    permissions: HashMap<PermissionName, PermissionState>,
    prompt_response: PromptResponse,
    query_fails: bool,
    injected_failures: VecDeque<CaptureError>,
    issued: Vec<MediaTrack>,
    display_tracks: Vec<MediaTrack>,
    user_media_requests: usize,
    display_media_requests: usize,
}

/// Scriptable capture devices
pub struct VirtualDevices {
    state: Mutex<VirtualState>,
    gate: watch::Sender<bool>,
    pending: watch::Sender<usize>,
}

impl VirtualDevices {
    /// Devices with every permission undecided and prompts accepted
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        let (pending, _) = watch::channel(0);
        Self {
            state: Mutex::new(VirtualState {
                permissions: HashMap::new(),
                prompt_response: PromptResponse::Accept,
                query_fails: false,
                injected_failures: VecDeque::new(),
                issued: Vec::new(),
                display_tracks: Vec::new(),
                user_media_requests: 0,
                display_media_requests: 0,
            }),
            gate,
            pending,
        }
    }

    /// Devices with every permission already granted
    pub fn granted() -> Self {
        let devices = Self::new();
        for name in [
            PermissionName::Microphone,
            PermissionName::Camera,
            PermissionName::DisplayCapture,
        ] {
            devices.set_permission(name, PermissionState::Granted);
        }
        devices
    }

    pub fn set_permission(&self, name: PermissionName, state: PermissionState) {
        self.state.lock().permissions.insert(name, state);
    }

    pub fn set_prompt_response(&self, response: PromptResponse) {
        self.state.lock().prompt_response = response;
    }

    /// Make permission queries fail as if the platform had no query support
    pub fn set_query_fails(&self, fails: bool) {
        self.state.lock().query_fails = fails;
    }

    /// Fail the next acquisition with `error`
    pub fn fail_next_acquisition(&self, error: CaptureError) {
        self.state.lock().injected_failures.push_back(error);
    }

    /// Hold every acquisition until [`release_acquisitions`](Self::release_acquisitions)
    pub fn hold_acquisitions(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_acquisitions(&self) {
        self.gate.send_replace(true);
    }

    /// Wait until at least `count` acquisitions are held in flight
    pub async fn wait_for_pending(&self, count: usize) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|pending| *pending >= count).await;
    }

    /// Simulate the platform's "stop sharing" control
    pub fn end_display_share(&self) -> usize {
        let tracks = self.state.lock().display_tracks.clone();
        tracks.iter().filter(|track| track.end()).count()
    }

    /// Every track handed out so far
    pub fn issued_tracks(&self) -> Vec<MediaTrack> {
        self.state.lock().issued.clone()
    }

    pub fn live_track_count(&self) -> usize {
        self.state.lock().issued.iter().filter(|t| t.is_live()).count()
    }

    pub fn user_media_requests(&self) -> usize {
        self.state.lock().user_media_requests
    }

    pub fn display_media_requests(&self) -> usize {
        self.state.lock().display_media_requests
    }

    async fn pass_gate(&self) {
        let mut gate = self.gate.subscribe();
        if *gate.borrow() {
            return;
        }
        self.pending.send_modify(|pending| *pending += 1);
        let _ = gate.wait_for(|open| *open).await;
        self.pending.send_modify(|pending| *pending -= 1);
    }

    /// Resolve a permission for an acquisition, answering a prompt if needed
    fn authorize(state: &mut VirtualState, name: PermissionName) -> CaptureResult<()> {
        let current = state
            .permissions
            .get(&name)
            .copied()
            .unwrap_or(PermissionState::Prompt);

        let resolved = match current {
            PermissionState::Prompt => match state.prompt_response {
                PromptResponse::Accept => PermissionState::Granted,
                PromptResponse::Deny => PermissionState::Denied,
            },
            decided => decided,
        };
        state.permissions.insert(name, resolved);

        match resolved {
            PermissionState::Granted => Ok(()),
            _ => Err(CaptureError::PermissionDenied(format!("{name:?} access was denied"))),
        }
    }

    fn issue(state: &mut VirtualState, track: MediaTrack) -> MediaTrack {
        state.issued.push(track.clone());
        track
    }
}

impl Default for VirtualDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDevices for VirtualDevices {
    async fn query_permission(&self, name: PermissionName) -> CaptureResult<PermissionState> {
        let state = self.state.lock();
        if state.query_fails {
            return Err(CaptureError::Unsupported("permission queries".to_string()));
        }
        Ok(state
            .permissions
            .get(&name)
            .copied()
            .unwrap_or(PermissionState::Prompt))
    }

    async fn get_user_media(&self, constraints: &MediaStreamConstraints) -> CaptureResult<MediaStream> {
        self.state.lock().user_media_requests += 1;
        self.pass_gate().await;

        let mut state = self.state.lock();
        if let Some(error) = state.injected_failures.pop_front() {
            return Err(error);
        }
        if constraints.is_empty() {
            return Err(CaptureError::Unsupported(
                "at least one of audio or video must be requested".to_string(),
            ));
        }

        if constraints.video.is_some() {
            Self::authorize(&mut state, PermissionName::Camera)?;
        }
        if constraints.audio.is_some() {
            Self::authorize(&mut state, PermissionName::Microphone)?;
        }

        let mut tracks = Vec::new();
        if let Some(video) = &constraints.video {
            let settings = TrackSettings {
                width: Some(video.ideal_width.unwrap_or(DEFAULT_CAMERA.0)),
                height: Some(video.ideal_height.unwrap_or(DEFAULT_CAMERA.1)),
                ..TrackSettings::default()
            };
            let track = MediaTrack::new(TrackKind::Video, "Virtual Camera", settings);
            tracks.push(Self::issue(&mut state, track));
        }
        if let Some(audio) = &constraints.audio {
            let settings = TrackSettings {
                echo_cancellation: Some(audio.echo_cancellation),
                noise_suppression: Some(audio.noise_suppression),
                ..TrackSettings::default()
            };
            let track = MediaTrack::new(TrackKind::Audio, "Virtual Microphone", settings);
            tracks.push(Self::issue(&mut state, track));
        }

        tracing::debug!("Virtual devices handed out {} user media track(s)", tracks.len());
        Ok(MediaStream::new(tracks))
    }

    async fn get_display_media(&self, constraints: &DisplayMediaConstraints) -> CaptureResult<MediaStream> {
        self.state.lock().display_media_requests += 1;
        self.pass_gate().await;

        let mut state = self.state.lock();
        if let Some(error) = state.injected_failures.pop_front() {
            return Err(error);
        }
        if !constraints.video {
            return Err(CaptureError::Unsupported(
                "display capture requires video".to_string(),
            ));
        }
        Self::authorize(&mut state, PermissionName::DisplayCapture)?;

        let settings = TrackSettings {
            width: Some(DEFAULT_DISPLAY.0),
            height: Some(DEFAULT_DISPLAY.1),
            ..TrackSettings::default()
        };
        let video = MediaTrack::new(TrackKind::Video, "Virtual Display", settings);
        state.display_tracks.push(video.clone());
        let mut tracks = vec![Self::issue(&mut state, video)];

        if constraints.audio {
            let audio = MediaTrack::new(TrackKind::Audio, "Virtual Display Audio", TrackSettings::default());
            tracks.push(Self::issue(&mut state, audio));
        }

        Ok(MediaStream::new(tracks))
    }
}
