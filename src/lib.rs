//! Media Recorder - camera, screen and voice recording sessions.
//!
//! This is the main library crate. It provides capture sessions with
//! start/pause/resume/stop controls, elapsed-time tracking and permission
//! handling, plus the panel that drives them from a UI.

pub mod capture;
pub mod commands;
pub mod config;
pub mod recorder;
pub mod utils;

use capture::VirtualDevices;
use commands::{PanelAction, RecorderPanel};
use config::RecorderSettings;
use recorder::{CaptureSession, MemoryRecorderFactory, SessionEvent, VoiceCapture};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_recorder_lib=debug,media_recorder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Run a scripted recording walkthrough against in-process devices
pub async fn run() -> anyhow::Result<()> {
    tracing::info!("Starting Media Recorder v{}", env!("CARGO_PKG_VERSION"));

    let settings = RecorderSettings::from_env()?;

    #[cfg(feature = "native-devices")]
    {
        for device in capture::native::list_audio_inputs() {
            tracing::info!("Microphone: {} (default: {})", device.name, device.is_default);
        }
        for camera in capture::native::list_cameras() {
            tracing::info!("Camera: {}", camera.name);
        }
    }

    let devices = Arc::new(VirtualDevices::granted());
    let recorders = Arc::new(MemoryRecorderFactory::new());
    let panel = RecorderPanel::new(devices.clone(), recorders.clone(), &settings);

    // Camera: preview, record, stop
    panel.perform(PanelAction::PreviewVideo).await?;
    panel.perform(PanelAction::StartVideo).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    for control in panel.controls() {
        tracing::info!("Control: {}", control.label);
    }
    panel.perform(PanelAction::StopVideo).await?;

    // Screen: record until the share is ended from outside
    let mut screen_events = panel.screen().subscribe();
    panel.perform(PanelAction::StartScreen).await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    devices.end_display_share();
    while let Ok(event) = screen_events.recv().await {
        if let SessionEvent::Stopped(_) = event {
            break;
        }
    }

    // Voice: record with a pause in the middle
    let voice = CaptureSession::builder(VoiceCapture)
        .config(settings.voice.clone())
        .after_stop(|artifact| {
            tracing::info!("Voice note ready at {} ({} bytes)", artifact.url, artifact.size());
        })
        .build(devices.clone(), recorders);
    if voice.request_permission().await && voice.start_recording().await {
        tokio::time::sleep(Duration::from_secs(1)).await;
        voice.pause_recording().await;
        voice.resume_recording().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        voice.stop_recording(false).await;
    }

    let urls = panel.playback_urls();
    println!("{}", serde_json::to_string_pretty(&urls)?);
    tracing::info!("Live tracks left: {}", devices.live_track_count());
    Ok(())
}
