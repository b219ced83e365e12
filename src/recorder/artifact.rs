//! Recording artifacts and their playback URLs
//!
//! A finished recording is exposed as an in-memory blob plus a local URL
//! registered in an [`ObjectUrlRegistry`]. Revoking a URL makes it
//! unresolvable; the blob itself lives as long as someone holds it.

use super::backend::RecordedMedia;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const URL_PREFIX: &str = "blob:media-recorder/";

/// A finished recording
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingArtifact {
    pub id: Uuid,
    #[serde(skip)]
    pub blob: Arc<[u8]>,
    pub mime_type: String,
    pub url: String,
    pub duration_secs: f64,
    pub created_at: DateTime<Utc>,
}

impl RecordingArtifact {
    pub fn size(&self) -> usize {
        self.blob.len()
    }
}

#[derive(Clone)]
struct RegisteredBlob {
    data: Arc<[u8]>,
    mime_type: String,
}

/// Local URLs for recorded blobs
#[derive(Default)]
pub struct ObjectUrlRegistry {
    entries: RwLock<HashMap<String, RegisteredBlob>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blob and return its URL
    pub fn create_url(&self, data: Arc<[u8]>, mime_type: &str) -> String {
        let url = format!("{URL_PREFIX}{}", Uuid::new_v4());
        self.entries.write().insert(
            url.clone(),
            RegisteredBlob {
                data,
                mime_type: mime_type.to_string(),
            },
        );
        url
    }

    /// Invalidate a URL; returns false if it was unknown
    pub fn revoke(&self, url: &str) -> bool {
        let revoked = self.entries.write().remove(url).is_some();
        if revoked {
            tracing::debug!("Revoked {}", url);
        }
        revoked
    }

    /// Look up the blob and mime type behind a URL
    pub fn resolve(&self, url: &str) -> Option<(Arc<[u8]>, String)> {
        self.entries
            .read()
            .get(url)
            .map(|entry| (entry.data.clone(), entry.mime_type.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Wrap recorder output into an artifact with a fresh URL
    pub fn publish(&self, media: RecordedMedia) -> RecordingArtifact {
        let blob: Arc<[u8]> = media.data.into();
        let url = self.create_url(blob.clone(), &media.mime_type);
        RecordingArtifact {
            id: Uuid::new_v4(),
            blob,
            mime_type: media.mime_type,
            url,
            duration_secs: media.duration_secs,
            created_at: Utc::now(),
        }
    }
}
