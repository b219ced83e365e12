//! Shared utilities
//!
//! Error types and clock formatting used across sessions and the UI layer.

pub mod error;
pub mod time;

pub use error::{AppError, AppResult, ErrorResponse};
pub use time::{format_clock, format_countdown};
