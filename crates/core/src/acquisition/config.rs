//! Acquisition pipeline configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the yt-dlp based acquisition pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Path to the yt-dlp binary.
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,

    /// Path to the ffmpeg binary, used for tagging.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Number of search results yt-dlp considers (`ytsearchN:`).
    #[serde(default = "default_search_results")]
    pub search_results: u32,

    /// Accepted difference between the candidate and track duration (seconds).
    #[serde(default = "default_duration_tolerance")]
    pub duration_tolerance_secs: u64,

    /// Timeout for each external process (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Embed the album cover as a front cover picture.
    #[serde(default = "default_embed_cover_art")]
    pub embed_cover_art: bool,
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_search_results() -> u32 {
    10
}

fn default_duration_tolerance() -> u64 {
    5
}

fn default_timeout() -> u64 {
    600 // 10 minutes
}

fn default_embed_cover_art() -> bool {
    true
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            ffmpeg_path: default_ffmpeg_path(),
            search_results: default_search_results(),
            duration_tolerance_secs: default_duration_tolerance(),
            timeout_secs: default_timeout(),
            embed_cover_art: default_embed_cover_art(),
        }
    }
}
