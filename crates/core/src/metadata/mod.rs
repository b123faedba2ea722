//! Track metadata lookup.
//!
//! The dispatcher resolves a job's external track id into [`TrackMetadata`]
//! before handing it to the acquisition pipeline.

mod config;
mod spotify;
mod types;

pub use config::SpotifyConfig;
pub use spotify::SpotifyClient;
pub use types::TrackMetadata;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when looking up track metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Track not found (404).
    #[error("Track not found: {0}")]
    NotFound(String),

    /// Credentials were rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, please wait before retrying")]
    RateLimitExceeded,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Client not configured (missing credentials, etc.).
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

/// Source of track metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Look up one track by its catalog id.
    async fn track(&self, external_track_id: &str) -> Result<TrackMetadata, MetadataError>;
}
