//! Spotify client configuration.

use serde::{Deserialize, Serialize};

/// Spotify Web API credentials and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    /// Client id for the client-credentials flow.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret for the client-credentials flow.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Web API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Accounts service base URL (token endpoint).
    #[serde(default = "default_accounts_base")]
    pub accounts_base: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_accounts_base() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base: default_api_base(),
            accounts_base: default_accounts_base(),
            timeout_secs: default_timeout(),
        }
    }
}

impl SpotifyConfig {
    /// Both credentials are present and non-empty.
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.client_id) && present(&self.client_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SpotifyConfig::default();
        assert_eq!(config.api_base, "https://api.spotify.com/v1");
        assert_eq!(config.accounts_base, "https://accounts.spotify.com");
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_has_credentials() {
        let mut config = SpotifyConfig {
            client_id: Some("id".to_string()),
            client_secret: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(!config.has_credentials());

        config.client_secret = Some("secret".to_string());
        assert!(config.has_credentials());
    }
}
