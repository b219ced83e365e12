//! Error types and handling
//!
//! Common error types used across the application.

use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::recorder::RecorderError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Recording error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("No recorder bound to the session")]
    NoRecorder,

    #[error("Stream acquisition finished after the session moved on")]
    StaleAcquisition,

    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

/// Error response for the UI layer
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Capture(CaptureError::PermissionDenied(_)) => "PERMISSION_DENIED",
            AppError::Capture(_) => "CAPTURE_ERROR",
            AppError::Recorder(_) => "RECORDING_ERROR",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::NoRecorder => "NO_RECORDER",
            AppError::StaleAcquisition => "STALE_ACQUISITION",
            AppError::InvalidState(_) => "INVALID_STATE",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
