//! Spotify Web API client.
//!
//! Uses the client-credentials flow: no user context, only catalog reads.
//! The access token is cached until shortly before it expires.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{MetadataError, MetadataProvider, SpotifyConfig, TrackMetadata};

/// Refresh the token this long before Spotify says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Spotify API client.
pub struct SpotifyClient {
    client: Client,
    api_base: String,
    accounts_base: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    /// Create a new Spotify client.
    pub fn new(config: &SpotifyConfig) -> Result<Self, MetadataError> {
        if !config.has_credentials() {
            return Err(MetadataError::NotConfigured(
                "Spotify client_id and client_secret are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            accounts_base: config.accounts_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            token: Mutex::new(None),
        })
    }

    /// Get a valid access token, requesting a new one if needed.
    async fn access_token(&self) -> Result<String, MetadataError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Requesting Spotify access token");

        let url = format!("{}/api/token", self.accounts_base);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::Unauthorized(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            MetadataError::ParseError(format!("Failed to parse token response: {}", e))
        })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }
}

#[async_trait]
impl MetadataProvider for SpotifyClient {
    async fn track(&self, external_track_id: &str) -> Result<TrackMetadata, MetadataError> {
        let token = self.access_token().await?;
        let url = format!("{}/tracks/{}", self.api_base, external_track_id);

        debug!("Spotify get track: id={}", external_track_id);

        let response = self.client.get(&url).bearer_auth(&token).send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            // Token revoked early; the next lookup fetches a fresh one.
            self.invalidate_token().await;
            return Err(MetadataError::Unauthorized(
                "Spotify rejected the access token".to_string(),
            ));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Spotify rate limit exceeded");
            return Err(MetadataError::RateLimitExceeded);
        }
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Err(MetadataError::NotFound(external_track_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let track: SpTrack = response.json().await.map_err(|e| {
            MetadataError::ParseError(format!("Failed to parse track response: {}", e))
        })?;

        Ok(track.into_metadata(external_track_id))
    }
}

// ============================================================================
// Spotify API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct SpTrack {
    name: String,
    duration_ms: u64,
    #[serde(default)]
    track_number: u32,
    #[serde(default)]
    disc_number: u32,
    #[serde(default)]
    artists: Vec<SpArtist>,
    album: SpAlbum,
}

#[derive(Debug, Deserialize)]
struct SpArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpAlbum {
    name: String,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    images: Vec<SpImage>,
}

#[derive(Debug, Deserialize)]
struct SpImage {
    url: String,
    #[serde(default)]
    width: Option<u32>,
}

impl SpTrack {
    fn into_metadata(self, external_track_id: &str) -> TrackMetadata {
        let cover_url = self
            .album
            .images
            .into_iter()
            .max_by_key(|image| image.width.unwrap_or(0))
            .map(|image| image.url);

        TrackMetadata {
            external_track_id: external_track_id.to_string(),
            title: self.name,
            artists: self.artists.into_iter().map(|a| a.name).collect(),
            album: self.album.name,
            track_number: self.track_number,
            disc_number: self.disc_number,
            release_date: self.album.release_date.filter(|d| !d.is_empty()),
            duration_ms: self.duration_ms,
            cover_url,
        }
    }
}
