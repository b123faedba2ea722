//! Turning track metadata into a stored, tagged audio artifact.

mod config;
mod error;
mod ytdlp;

pub use config::AcquisitionConfig;
pub use error::AcquisitionError;
pub use ytdlp::{build_download_args, build_tag_args, clean_track_name, search_query, YtDlpPipeline};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::metadata::TrackMetadata;

/// A stored artifact produced by a successful acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// File name inside the artifact store.
    pub reference: String,
    pub size_bytes: u64,
}

/// Produces a local audio artifact with embedded tags.
///
/// From the dispatcher's viewpoint this is a pure function: metadata in,
/// artifact or failure out.
#[async_trait]
pub trait AcquisitionPipeline: Send + Sync {
    /// Pipeline name for logging.
    fn name(&self) -> &str;

    async fn acquire(&self, track: &TrackMetadata) -> Result<Artifact, AcquisitionError>;
}
