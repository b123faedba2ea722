//! Track metadata as retrieved from the catalog.

use serde::{Deserialize, Serialize};

use crate::job::TrackSummary;

/// Metadata needed to locate and tag one track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Catalog id of the track (the job's natural key).
    pub external_track_id: String,
    pub title: String,
    /// Artist names in credit order.
    pub artists: Vec<String>,
    pub album: String,
    pub track_number: u32,
    pub disc_number: u32,
    /// Release date as the catalog reports it (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`).
    pub release_date: Option<String>,
    pub duration_ms: u64,
    /// URL of the largest album cover image.
    pub cover_url: Option<String>,
}

impl TrackMetadata {
    /// Artists joined with `", "`.
    pub fn artists_joined(&self) -> String {
        self.artists.join(", ")
    }

    pub fn first_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }

    /// Duration rounded down to whole seconds.
    pub fn duration_secs(&self) -> u64 {
        self.duration_ms / 1000
    }

    /// The subset recorded on a completed job.
    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            title: self.title.clone(),
            artists: self.artists_joined(),
            album: self.album.clone(),
            duration_ms: self.duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> TrackMetadata {
        TrackMetadata {
            external_track_id: "6rqhFgbbKwnb9MLmUQDhG6".to_string(),
            title: "Speak to Me".to_string(),
            artists: vec!["Pink Floyd".to_string(), "Nick Mason".to_string()],
            album: "The Dark Side of the Moon".to_string(),
            track_number: 1,
            disc_number: 1,
            release_date: Some("1973-03-01".to_string()),
            duration_ms: 67_999,
            cover_url: None,
        }
    }

    #[test]
    fn test_artists_joined() {
        assert_eq!(metadata().artists_joined(), "Pink Floyd, Nick Mason");
        assert_eq!(metadata().first_artist(), Some("Pink Floyd"));
    }

    #[test]
    fn test_duration_secs_rounds_down() {
        assert_eq!(metadata().duration_secs(), 67);
    }

    #[test]
    fn test_summary() {
        let summary = metadata().summary();
        assert_eq!(summary.title, "Speak to Me");
        assert_eq!(summary.artists, "Pink Floyd, Nick Mason");
        assert_eq!(summary.duration_ms, 67_999);
    }
}
