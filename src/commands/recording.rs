//! Recording controls for the UI
//!
//! [`RecorderPanel`] pairs a camera session with a screen session and
//! decides which controls are shown and what they do.

use crate::capture::MediaDevices;
use crate::config::RecorderSettings;
use crate::recorder::{
    CameraCapture, CaptureSession, ObjectUrlRegistry, RecorderFactory, RecordingArtifact,
    ScreenCapture,
};
use crate::utils::error::{AppError, ErrorResponse};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Something a control does when pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelAction {
    PreviewVideo,
    StartVideo,
    StopVideo,
    StartScreen,
    StopScreen,
}

/// A visible button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    pub action: PanelAction,
    pub label: String,
    /// Rendered as a destructive action
    pub danger: bool,
}

/// Where finished recordings can be played back
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackUrls {
    pub video: Option<String>,
    pub screen: Option<String>,
}

/// Camera and screen recorders behind one set of controls
pub struct RecorderPanel {
    video: CaptureSession,
    screen: CaptureSession,
    is_streaming_video: Mutex<bool>,
}

impl RecorderPanel {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        recorders: Arc<dyn RecorderFactory>,
        settings: &RecorderSettings,
    ) -> Self {
        let urls = Arc::new(ObjectUrlRegistry::new());
        let video = CaptureSession::builder(CameraCapture)
            .config(settings.video.clone())
            .url_registry(urls.clone())
            .build(devices.clone(), recorders.clone());
        let screen = CaptureSession::builder(ScreenCapture)
            .config(settings.screen.clone())
            .url_registry(urls)
            .build(devices, recorders);

        Self {
            video,
            screen,
            is_streaming_video: Mutex::new(false),
        }
    }

    pub fn video(&self) -> &CaptureSession {
        &self.video
    }

    pub fn screen(&self) -> &CaptureSession {
        &self.screen
    }

    pub fn is_streaming_video(&self) -> bool {
        *self.is_streaming_video.lock()
    }

    fn set_streaming_video(&self, streaming: bool) {
        *self.is_streaming_video.lock() = streaming;
    }

    async fn ensure_permission(session: &CaptureSession) -> Result<(), ErrorResponse> {
        if session.has_permission().await || session.request_permission().await {
            return Ok(());
        }
        tracing::error!("Please grant the required permission");
        Err(AppError::PermissionDenied(format!("{} access was not granted", session.name())).into())
    }

    /// Show the camera preview so a video recording can be started
    pub async fn preview_video_stream(&self) -> Result<(), ErrorResponse> {
        Self::ensure_permission(&self.video).await?;

        self.reset_recorders().await;
        self.video.try_setup_stream().await?;
        self.set_streaming_video(true);
        Ok(())
    }

    /// Stop the video recording if one is running, otherwise start it
    pub async fn start_or_stop_video_record(&self) -> Result<Option<RecordingArtifact>, ErrorResponse> {
        if self.video.state().is_capturing() {
            let artifact = self.video.stop_recording(false).await;
            self.set_streaming_video(false);
            return Ok(artifact);
        }

        self.video.try_start_recording().await?;
        Ok(None)
    }

    /// Stop the screen recording if one is running, otherwise start a new one
    pub async fn start_or_stop_screen_record(&self) -> Result<Option<RecordingArtifact>, ErrorResponse> {
        Self::ensure_permission(&self.screen).await?;

        if self.screen.state().is_capturing() {
            return Ok(self.screen.stop_recording(false).await);
        }

        self.reset_recorders().await;
        self.screen.try_setup_stream().await?;
        self.screen.try_start_recording().await?;
        Ok(None)
    }

    /// Reset both recorders and hide the camera preview
    pub async fn reset_recorders(&self) {
        self.video.reset().await;
        self.screen.reset().await;
        self.set_streaming_video(false);
    }

    /// Run the handler behind a control
    pub async fn perform(&self, action: PanelAction) -> Result<Option<RecordingArtifact>, ErrorResponse> {
        tracing::debug!("Panel action: {:?}", action);
        match action {
            PanelAction::PreviewVideo => self.preview_video_stream().await.map(|_| None),
            PanelAction::StartVideo | PanelAction::StopVideo => self.start_or_stop_video_record().await,
            PanelAction::StartScreen | PanelAction::StopScreen => self.start_or_stop_screen_record().await,
        }
    }

    /// Controls to show for the current state, in display order
    pub fn controls(&self) -> Vec<Control> {
        let video_recording = self.video.state().is_capturing();
        let screen_recording = self.screen.state().is_capturing();
        let streaming = self.is_streaming_video();
        let mut controls = Vec::new();

        if !screen_recording && !video_recording {
            controls.push(if streaming {
                Control {
                    action: PanelAction::StartVideo,
                    label: "Start Video Recording".to_string(),
                    danger: false,
                }
            } else {
                Control {
                    action: PanelAction::PreviewVideo,
                    label: "Preview Video Recording".to_string(),
                    danger: false,
                }
            });
        }

        if video_recording {
            controls.push(Control {
                action: PanelAction::StopVideo,
                label: format!("Stop Video Recording ( {} )", self.video.elapsed_as_clock()),
                danger: true,
            });
        } else if screen_recording {
            controls.push(Control {
                action: PanelAction::StopScreen,
                label: format!("Stop Screen Recording ( {} )", self.screen.elapsed_as_clock()),
                danger: true,
            });
        } else {
            controls.push(Control {
                action: PanelAction::StartScreen,
                label: "Start Screen Recording".to_string(),
                danger: false,
            });
        }

        controls
    }

    /// Whether each live preview should be visible
    pub fn visible_previews(&self) -> (bool, bool) {
        (self.is_streaming_video(), self.screen.state().is_capturing())
    }

    pub fn playback_urls(&self) -> PlaybackUrls {
        let non_empty = |url: String| (!url.is_empty()).then_some(url);
        PlaybackUrls {
            video: non_empty(self.video.recorded_url()),
            screen: non_empty(self.screen.recorded_url()),
        }
    }
}
