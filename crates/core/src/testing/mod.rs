//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the dispatcher's
//! collaborators, allowing end-to-end tests without yt-dlp, ffmpeg or
//! network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use groovio_core::testing::{MockAcquisitionPipeline, MockMetadataProvider};
//!
//! let metadata = MockMetadataProvider::new();
//! let pipeline = MockAcquisitionPipeline::new();
//!
//! // Configure mock behavior
//! pipeline.fail_track("track-b").await;
//!
//! // Hand both to a Dispatcher...
//! ```

mod mock_metadata;
mod mock_pipeline;

pub use mock_metadata::MockMetadataProvider;
pub use mock_pipeline::MockAcquisitionPipeline;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::acquisition::AcquisitionConfig;
    use crate::config::Config;
    use crate::dispatcher::DispatcherConfig;
    use crate::metadata::TrackMetadata;

    /// Create test track metadata with reasonable defaults.
    pub fn track_metadata(external_track_id: &str) -> TrackMetadata {
        TrackMetadata {
            external_track_id: external_track_id.to_string(),
            title: format!("Song {}", external_track_id),
            artists: vec!["Test Artist".to_string()],
            album: "Test Album".to_string(),
            track_number: 1,
            disc_number: 1,
            release_date: Some("2024-01-01".to_string()),
            duration_ms: 180_000,
            cover_url: None,
        }
    }

    /// Dispatcher config with a fast tick and a short shutdown grace.
    pub fn dispatcher_config(max_concurrent_jobs: usize) -> DispatcherConfig {
        DispatcherConfig {
            enabled: true,
            tick_interval_ms: 50,
            max_concurrent_jobs,
            stale_after_secs: None,
            shutdown_grace_ms: 1_000,
        }
    }

    /// Full config rooted in `dir` (database, artifacts and scratch files).
    pub fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.database.path = dir.join("groovio.db");
        config.storage.artifact_dir = dir.join("artifacts");
        config.storage.temp_dir = dir.join("tmp");
        config.dispatcher = dispatcher_config(2);
        config.acquisition = AcquisitionConfig::default();
        config
    }
}
