//! Mock metadata provider for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::metadata::{MetadataError, MetadataProvider, TrackMetadata};

use super::fixtures;

/// Mock implementation of the MetadataProvider trait.
///
/// Unknown track ids resolve to [`fixtures::track_metadata`] unless they
/// were marked missing.
#[derive(Debug)]
pub struct MockMetadataProvider {
    /// Pre-configured metadata by track id.
    tracks: Arc<RwLock<HashMap<String, TrackMetadata>>>,
    /// Track ids that return NotFound.
    missing: Arc<RwLock<HashSet<String>>>,
    /// If set, the next lookup fails with this error.
    next_error: Arc<RwLock<Option<MetadataError>>>,
    /// Looked up track ids, in order.
    lookups: Arc<RwLock<Vec<String>>>,
}

impl Default for MockMetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMetadataProvider {
    /// Create a new mock provider.
    pub fn new() -> Self {
        Self {
            tracks: Arc::new(RwLock::new(HashMap::new())),
            missing: Arc::new(RwLock::new(HashSet::new())),
            next_error: Arc::new(RwLock::new(None)),
            lookups: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the metadata returned for a track id.
    pub async fn set_track(&self, track: TrackMetadata) {
        self.tracks
            .write()
            .await
            .insert(track.external_track_id.clone(), track);
    }

    /// Make lookups of `track_id` fail with NotFound.
    pub async fn set_missing(&self, track_id: impl Into<String>) {
        self.missing.write().await.insert(track_id.into());
    }

    /// Set an error to return on the next lookup.
    pub async fn set_next_error(&self, error: MetadataError) {
        *self.next_error.write().await = Some(error);
    }

    /// Track ids looked up so far.
    pub async fn lookups(&self) -> Vec<String> {
        self.lookups.read().await.clone()
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    async fn track(&self, external_track_id: &str) -> Result<TrackMetadata, MetadataError> {
        self.lookups
            .write()
            .await
            .push(external_track_id.to_string());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        if self.missing.read().await.contains(external_track_id) {
            return Err(MetadataError::NotFound(external_track_id.to_string()));
        }

        Ok(self
            .tracks
            .read()
            .await
            .get(external_track_id)
            .cloned()
            .unwrap_or_else(|| fixtures::track_metadata(external_track_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_and_overrides() {
        let provider = MockMetadataProvider::new();

        let track = provider.track("abc").await.unwrap();
        assert_eq!(track.external_track_id, "abc");

        let mut custom = fixtures::track_metadata("xyz");
        custom.title = "Custom".to_string();
        provider.set_track(custom).await;
        assert_eq!(provider.track("xyz").await.unwrap().title, "Custom");

        provider.set_missing("gone").await;
        assert!(matches!(
            provider.track("gone").await,
            Err(MetadataError::NotFound(_))
        ));

        assert_eq!(provider.lookups().await.len(), 3);
    }
}
