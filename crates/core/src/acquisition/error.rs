//! Error types for the acquisition module.

use thiserror::Error;

use crate::media::ArtifactError;
use crate::metadata::MetadataError;

/// Errors that can occur while acquiring a track.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// External tool binary not found.
    #[error("{tool} not found at path: {path}")]
    ToolNotFound { tool: &'static str, path: String },

    /// External tool exited unsuccessfully.
    #[error("{tool} failed: {reason}")]
    ToolFailed {
        tool: &'static str,
        reason: String,
        stderr: Option<String>,
    },

    /// External tool did not finish in time and was killed.
    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: &'static str, timeout_secs: u64 },

    /// No search result matched the track.
    #[error("no source matched track {0}")]
    NoMatch(String),

    /// Metadata lookup failed before acquisition started.
    #[error("metadata lookup failed: {0}")]
    Metadata(#[from] MetadataError),

    /// Storing the artifact failed.
    #[error("artifact storage failed: {0}")]
    Artifact(#[from] ArtifactError),

    /// I/O error on scratch files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The pipeline task panicked.
    #[error("acquisition panicked: {0}")]
    Panicked(String),

    /// Scripted failure from a test double.
    #[error("{0}")]
    Other(String),
}

impl AcquisitionError {
    /// Creates a tool failure error.
    pub fn tool_failed(
        tool: &'static str,
        reason: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        Self::ToolFailed {
            tool,
            reason: reason.into(),
            stderr,
        }
    }
}
