//! Host capture devices
//!
//! Microphones are discovered with cpal and cameras with nokhwa. Access is
//! considered granted when a matching device can be opened for listing;
//! display capture has no portable backend here and is reported as
//! unsupported.

use super::stream::{MediaStream, MediaTrack, TrackKind, TrackSettings};
use super::traits::{
    AudioDeviceInfo, CameraInfo, CaptureError, CaptureResult, DisplayMediaConstraints,
    MediaDevices, MediaStreamConstraints, PermissionName, PermissionState, Resolution,
};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use nokhwa::utils::{ApiBackend, CameraIndex};

/// Get list of available audio input devices (microphones)
pub fn list_audio_inputs() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = match host.input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("Failed to enumerate audio inputs: {}", e);
            return Vec::new();
        }
    };

    devices
        .filter_map(|device| device.name().ok())
        .enumerate()
        .map(|(index, name)| AudioDeviceInfo {
            id: index.to_string(),
            is_default: default_name.as_ref() == Some(&name),
            name,
        })
        .collect()
}

/// Get list of available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                    supported_resolutions: vec![
                        Resolution { width: 1920, height: 1080 },
                        Resolution { width: 1280, height: 720 },
                        Resolution { width: 640, height: 480 },
                    ],
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

async fn default_microphone() -> CaptureResult<AudioDeviceInfo> {
    tokio::task::spawn_blocking(list_audio_inputs)
        .await
        .map_err(|e| CaptureError::NotReadable(e.to_string()))?
        .into_iter()
        .max_by_key(|device| device.is_default)
        .ok_or_else(|| CaptureError::NotFound("no microphone".to_string()))
}

async fn first_camera() -> CaptureResult<CameraInfo> {
    tokio::task::spawn_blocking(list_cameras)
        .await
        .map_err(|e| CaptureError::NotReadable(e.to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| CaptureError::NotFound("no camera".to_string()))
}

/// Capture devices of the host machine
#[derive(Debug, Default)]
pub struct NativeDevices;

impl NativeDevices {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaDevices for NativeDevices {
    async fn query_permission(&self, name: PermissionName) -> CaptureResult<PermissionState> {
        let available = match name {
            PermissionName::Microphone => default_microphone().await.is_ok(),
            PermissionName::Camera => first_camera().await.is_ok(),
            PermissionName::DisplayCapture => return Ok(PermissionState::Prompt),
        };
        Ok(if available {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        })
    }

    async fn get_user_media(&self, constraints: &MediaStreamConstraints) -> CaptureResult<MediaStream> {
        let mut tracks = Vec::new();

        if let Some(video) = &constraints.video {
            let camera = first_camera().await?;
            let fallback = camera
                .supported_resolutions
                .first()
                .copied()
                .unwrap_or(Resolution { width: 1280, height: 720 });
            let settings = TrackSettings {
                width: Some(video.ideal_width.unwrap_or(fallback.width)),
                height: Some(video.ideal_height.unwrap_or(fallback.height)),
                ..TrackSettings::default()
            };
            tracks.push(MediaTrack::new(TrackKind::Video, camera.name, settings));
        }

        if let Some(audio) = &constraints.audio {
            let microphone = match default_microphone().await {
                Ok(microphone) => microphone,
                Err(e) => {
                    tracks.iter().for_each(|t: &MediaTrack| {
                        t.stop();
                    });
                    return Err(e);
                }
            };
            let settings = TrackSettings {
                echo_cancellation: Some(audio.echo_cancellation),
                noise_suppression: Some(audio.noise_suppression),
                ..TrackSettings::default()
            };
            tracks.push(MediaTrack::new(TrackKind::Audio, microphone.name, settings));
        }

        if tracks.is_empty() {
            return Err(CaptureError::Unsupported(
                "at least one of audio or video must be requested".to_string(),
            ));
        }
        tracing::info!("Acquired {} host track(s)", tracks.len());
        Ok(MediaStream::new(tracks))
    }

    async fn get_display_media(&self, _constraints: &DisplayMediaConstraints) -> CaptureResult<MediaStream> {
        Err(CaptureError::Unsupported(
            "display capture is not available on this host".to_string(),
        ))
    }
}
