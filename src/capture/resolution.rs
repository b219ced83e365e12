//! Camera resolution presets
//!
//! Presets are keyed by a nominal height. The 8K preset keeps its
//! historical key of 7680 while its real height is 4320.

use serde::{Deserialize, Serialize};

/// One preset in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionEntry {
    pub key: u32,
    pub width: u32,
    pub height: u32,
    pub quality_label: Option<&'static str>,
}

/// A selectable option for a resolution picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOption {
    pub value: u32,
    pub label: String,
}

/// Presets, lowest first
pub const RESOLUTIONS: [ResolutionEntry; 7] = [
    ResolutionEntry { key: 360, width: 640, height: 360, quality_label: None },
    ResolutionEntry { key: 480, width: 640, height: 480, quality_label: None },
    ResolutionEntry { key: 720, width: 1280, height: 720, quality_label: None },
    ResolutionEntry { key: 1080, width: 1920, height: 1080, quality_label: None },
    ResolutionEntry { key: 1440, width: 2560, height: 1440, quality_label: None },
    ResolutionEntry { key: 2160, width: 3840, height: 2160, quality_label: Some("4K") },
    ResolutionEntry { key: 7680, width: 7680, height: 4320, quality_label: Some("8K") },
];

/// Find the preset for a height key
pub fn lookup(key: u32) -> Option<&'static ResolutionEntry> {
    RESOLUTIONS.iter().find(|entry| entry.key == key)
}

/// Render `<height>p[ (quality)]: <width>x<height>`
pub fn label(entry: &ResolutionEntry) -> String {
    let quality = entry
        .quality_label
        .map(|q| format!(" ({q})"))
        .unwrap_or_default();
    format!("{}p{}: {}x{}", entry.height, quality, entry.width, entry.height)
}

/// All presets as picker options, highest resolution first
pub fn options() -> Vec<ResolutionOption> {
    RESOLUTIONS
        .iter()
        .rev()
        .map(|entry| ResolutionOption {
            value: entry.key,
            label: label(entry),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_plain_and_qualified() {
        assert_eq!(label(lookup(720).unwrap()), "720p: 1280x720");
        assert_eq!(label(lookup(2160).unwrap()), "2160p (4K): 3840x2160");
        assert_eq!(label(lookup(7680).unwrap()), "4320p (8K): 7680x4320");
    }

    #[test]
    fn test_lookup_unknown_key() {
        assert!(lookup(1000).is_none());
        assert!(lookup(4320).is_none());
    }

    #[test]
    fn test_options_highest_first() {
        let opts = options();
        assert_eq!(opts.len(), RESOLUTIONS.len());
        assert_eq!(opts.first().unwrap().value, 7680);
        assert_eq!(opts.last().unwrap().value, 360);
        assert_eq!(opts.last().unwrap().label, "360p: 640x360");
    }
}
