//! Recording system module
//!
//! This module implements the capture-session architecture:
//! - CaptureStrategy for the camera, screen and voice capture kinds
//! - CaptureSession to drive one recording through its lifecycle
//! - StreamRecorder/RecorderFactory as the seam to media encoders

pub mod artifact;
pub mod backend;
pub mod memory;
pub mod session;
pub mod state;
pub mod strategy;
pub mod timer;

pub use artifact::{ObjectUrlRegistry, RecordingArtifact};
pub use backend::{
    MediaKind, RecordedMedia, RecorderError, RecorderFactory, RecorderOptions, RecorderState,
    StreamRecorder,
};
pub use memory::{MemoryRecorder, MemoryRecorderFactory};
pub use session::{AfterStopCallback, CaptureSession, SessionBuilder, SessionEvent};
pub use state::{RecordingState, SessionConfig, SessionSnapshot};
pub use strategy::{Capabilities, CameraCapture, CaptureStrategy, ScreenCapture, VoiceCapture};
