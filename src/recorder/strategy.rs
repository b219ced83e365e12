//! Capture strategies
//!
//! The three capture kinds share one session implementation and differ
//! only in how they acquire their stream and what they can do with it.

use super::backend::RecorderOptions;
use super::state::SessionConfig;
use crate::capture::resolution;
use crate::capture::{
    AudioConstraints, CaptureResult, DisplayMediaConstraints, FacingMode, MediaDevices,
    MediaStream, MediaStreamConstraints, MediaTrack, VideoConstraints,
};
use async_trait::async_trait;

/// What a capture kind supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Recording can be paused and resumed
    pub supports_pause: bool,
    /// Microphone audio is merged into a separately acquired video stream
    pub requires_mixed_audio: bool,
    /// A stream is previewed before recording starts
    pub has_preview: bool,
    /// Starting a recording acquires the stream itself
    pub implicit_setup: bool,
}

/// Devices held by a session after a successful acquisition
#[derive(Debug, Clone)]
pub struct AcquiredStream {
    /// Stream handed to the recorder
    pub stream: MediaStream,
    /// Every stream acquired from the devices
    pub sources: Vec<MediaStream>,
    /// Stream to show as a live preview
    pub preview: Option<MediaStream>,
    /// Track whose external end stops the recording
    pub end_signal: Option<MediaTrack>,
}

impl AcquiredStream {
    fn single(stream: MediaStream, preview: bool) -> Self {
        Self {
            preview: preview.then(|| stream.clone()),
            sources: vec![stream.clone()],
            stream,
            end_signal: None,
        }
    }

    /// Stop every acquired track
    pub fn release(&self) {
        for source in &self.sources {
            source.stop();
        }
        self.stream.stop();
    }

    /// Merge the tracks of `extra` into the recorded stream
    fn mix_in(mut self, extra: MediaStream) -> Self {
        self.stream = MediaStream::mixed(&[&self.stream, &extra]);
        self.sources.push(extra);
        self
    }
}

/// Per-kind stream acquisition
#[async_trait]
pub trait CaptureStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    fn recorder_options(&self) -> RecorderOptions;

    /// Constraints used when prompting for access
    fn permission_constraints(&self) -> MediaStreamConstraints;

    /// Acquire the kind's own stream; see [`acquire_stream`] for mixing
    async fn acquire(&self, devices: &dyn MediaDevices, config: &SessionConfig) -> CaptureResult<AcquiredStream>;
}

/// Acquire the stream for `strategy`, mixing in microphone audio when
/// its capabilities ask for it.
///
/// If the microphone cannot be acquired the primary stream is released.
pub async fn acquire_stream(
    strategy: &dyn CaptureStrategy,
    devices: &dyn MediaDevices,
    config: &SessionConfig,
) -> CaptureResult<AcquiredStream> {
    let acquired = strategy.acquire(devices, config).await?;
    if !strategy.capabilities().requires_mixed_audio {
        return Ok(acquired);
    }

    let constraints = MediaStreamConstraints {
        audio: Some(AudioConstraints::voice()),
        video: None,
    };
    match devices.get_user_media(&constraints).await {
        Ok(microphone) => {
            tracing::debug!("Mixing microphone audio into {} stream", strategy.name());
            Ok(acquired.mix_in(microphone))
        }
        Err(e) => {
            acquired.release();
            Err(e)
        }
    }
}

/// Camera plus microphone
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraCapture;

impl CameraCapture {
    fn video_constraints(config: &SessionConfig) -> VideoConstraints {
        let mut video = VideoConstraints {
            facing_mode: Some(FacingMode::User),
            ..VideoConstraints::default()
        };

        if let Some(key) = config.resolution {
            match resolution::lookup(key) {
                Some(entry) => {
                    video.ideal_width = Some(entry.width);
                    video.ideal_height = Some(entry.height);
                }
                None => tracing::warn!("Ignoring unknown resolution key {}", key),
            }
        }
        video
    }
}

#[async_trait]
impl CaptureStrategy for CameraCapture {
    fn name(&self) -> &'static str {
        "camera"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_pause: true,
            requires_mixed_audio: false,
            has_preview: true,
            implicit_setup: false,
        }
    }

    fn recorder_options(&self) -> RecorderOptions {
        RecorderOptions::webm_video()
    }

    fn permission_constraints(&self) -> MediaStreamConstraints {
        MediaStreamConstraints {
            audio: Some(AudioConstraints::default()),
            video: Some(VideoConstraints::default()),
        }
    }

    async fn acquire(&self, devices: &dyn MediaDevices, config: &SessionConfig) -> CaptureResult<AcquiredStream> {
        let constraints = MediaStreamConstraints {
            audio: Some(AudioConstraints::voice()),
            video: Some(Self::video_constraints(config)),
        };
        let stream = devices.get_user_media(&constraints).await?;
        Ok(AcquiredStream::single(stream, true))
    }
}

/// Screen share mixed with microphone audio
#[derive(Debug, Clone, Copy, Default)]
pub struct ScreenCapture;

#[async_trait]
impl CaptureStrategy for ScreenCapture {
    fn name(&self) -> &'static str {
        "screen"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_pause: false,
            requires_mixed_audio: true,
            has_preview: false,
            implicit_setup: false,
        }
    }

    fn recorder_options(&self) -> RecorderOptions {
        RecorderOptions::webm_video()
    }

    fn permission_constraints(&self) -> MediaStreamConstraints {
        MediaStreamConstraints {
            audio: Some(AudioConstraints::voice()),
            video: None,
        }
    }

    async fn acquire(&self, devices: &dyn MediaDevices, _config: &SessionConfig) -> CaptureResult<AcquiredStream> {
        let display = devices
            .get_display_media(&DisplayMediaConstraints::default())
            .await?;
        let end_signal = display.video_tracks().next().cloned();

        Ok(AcquiredStream {
            stream: display.clone(),
            preview: Some(display.clone()),
            sources: vec![display],
            end_signal,
        })
    }
}

/// Microphone only
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceCapture;

#[async_trait]
impl CaptureStrategy for VoiceCapture {
    fn name(&self) -> &'static str {
        "voice"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_pause: true,
            requires_mixed_audio: false,
            has_preview: false,
            implicit_setup: true,
        }
    }

    fn recorder_options(&self) -> RecorderOptions {
        RecorderOptions::wav_audio()
    }

    fn permission_constraints(&self) -> MediaStreamConstraints {
        MediaStreamConstraints {
            audio: Some(AudioConstraints::default()),
            video: None,
        }
    }

    async fn acquire(&self, devices: &dyn MediaDevices, _config: &SessionConfig) -> CaptureResult<AcquiredStream> {
        let constraints = MediaStreamConstraints {
            audio: Some(AudioConstraints::voice()),
            video: None,
        };
        let stream = devices.get_user_media(&constraints).await?;
        Ok(AcquiredStream::single(stream, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureError, VirtualDevices};

    #[tokio::test]
    async fn test_camera_applies_resolution() {
        let devices = VirtualDevices::granted();
        let config = SessionConfig::default().with_resolution(1080);

        let acquired = CameraCapture.acquire(&devices, &config).await.unwrap();
        let video = acquired.stream.video_tracks().next().unwrap();
        assert_eq!(video.settings().width, Some(1920));
        assert_eq!(video.settings().height, Some(1080));
        assert!(acquired.preview.is_some());
    }

    #[tokio::test]
    async fn test_camera_ignores_unknown_resolution() {
        let devices = VirtualDevices::granted();
        let config = SessionConfig::default().with_resolution(1234);

        let acquired = CameraCapture.acquire(&devices, &config).await.unwrap();
        let video = acquired.stream.video_tracks().next().unwrap();
        assert_eq!(video.settings().width, Some(1280));
    }

    #[tokio::test]
    async fn test_screen_mixes_microphone() {
        let devices = VirtualDevices::granted();
        let acquired = acquire_stream(&ScreenCapture, &devices, &SessionConfig::default())
            .await
            .unwrap();

        assert_eq!(acquired.stream.video_tracks().count(), 1);
        assert_eq!(acquired.stream.audio_tracks().count(), 1);
        assert_eq!(acquired.sources.len(), 2);
        assert!(acquired.end_signal.is_some());
        assert_eq!(devices.display_media_requests(), 1);
        assert_eq!(devices.user_media_requests(), 1);

        acquired.release();
        assert_eq!(devices.live_track_count(), 0);
    }

    #[tokio::test]
    async fn test_unmixed_strategies_skip_microphone() {
        let devices = VirtualDevices::granted();
        let acquired = acquire_stream(&CameraCapture, &devices, &SessionConfig::default())
            .await
            .unwrap();

        assert_eq!(acquired.sources.len(), 1);
        assert_eq!(devices.user_media_requests(), 1);
        assert_eq!(devices.display_media_requests(), 0);

        let display_only = ScreenCapture
            .acquire(&devices, &SessionConfig::default())
            .await
            .unwrap();
        assert_eq!(display_only.stream.audio_tracks().count(), 0);
    }

    #[tokio::test]
    async fn test_screen_releases_display_when_microphone_fails() {
        let devices = VirtualDevices::granted();
        devices.set_permission(
            crate::capture::PermissionName::Microphone,
            crate::capture::PermissionState::Denied,
        );

        let err = acquire_stream(&ScreenCapture, &devices, &SessionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert_eq!(devices.display_media_requests(), 1);
        assert_eq!(devices.live_track_count(), 0);
    }
}
