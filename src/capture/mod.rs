//! Capture devices
//!
//! Device permissions, stream acquisition and the live stream handles
//! sessions record from.

pub mod resolution;
pub mod stream;
pub mod traits;
pub mod virtual_devices;

#[cfg(feature = "native-devices")]
pub mod native;

pub use stream::{MediaStream, MediaTrack, TrackKind, TrackSettings, TrackState};
pub use traits::{
    AudioConstraints, AudioDeviceInfo, CameraInfo, CaptureError, CaptureResult,
    DisplayMediaConstraints, FacingMode, MediaDevices, MediaStreamConstraints, PermissionName,
    PermissionState, Resolution, VideoConstraints,
};
pub use virtual_devices::{PromptResponse, VirtualDevices};
