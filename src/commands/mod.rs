//! UI-facing command handlers
//!
//! These drive the recorder sessions on behalf of the interface layer.

pub mod recording;

pub use recording::{Control, PanelAction, PlaybackUrls, RecorderPanel};
