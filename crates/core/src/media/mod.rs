//! Artifact storage and byte-range resolution for playback.

mod artifact_store;
mod range;

pub use artifact_store::{ArtifactError, ArtifactStore, OpenArtifact};
pub use range::{resolve_range, ByteRange, RangeError, ServedRange};

/// Content type of every stored artifact.
pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";
