//! Local directory of stored audio artifacts.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;
use tracing::debug;

/// Errors from artifact storage.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The reference is not a bare file name.
    #[error("invalid artifact reference: {0}")]
    InvalidReference(String),

    /// No file exists for the reference.
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An artifact opened for reading.
#[derive(Debug)]
pub struct OpenArtifact {
    pub file: File,
    pub size: u64,
}

/// Flat directory of artifacts addressed by file name.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open the store, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// References are bare file names; anything that could escape the root
    /// is rejected.
    pub fn validate_reference(reference: &str) -> Result<(), ArtifactError> {
        let invalid = reference.is_empty()
            || reference == "."
            || reference == ".."
            || reference.contains(['/', '\\', '\0'])
            || reference.contains("..");
        if invalid {
            return Err(ArtifactError::InvalidReference(reference.to_string()));
        }
        Ok(())
    }

    /// Path of a reference under the root.
    pub fn path_for(&self, reference: &str) -> Result<PathBuf, ArtifactError> {
        Self::validate_reference(reference)?;
        Ok(self.root.join(reference))
    }

    /// Move `source` into the store under `reference`, returning its size.
    ///
    /// Falls back to copy-and-delete when a rename crosses filesystems.
    pub async fn put(&self, source: &Path, reference: &str) -> Result<u64, ArtifactError> {
        let target = self.path_for(reference)?;

        if let Err(rename_err) = tokio::fs::rename(source, &target).await {
            debug!(
                source = %source.display(),
                error = %rename_err,
                "Rename into artifact store failed, copying instead"
            );
            tokio::fs::copy(source, &target).await?;
            tokio::fs::remove_file(source).await?;
        }

        let size = tokio::fs::metadata(&target).await?.len();
        debug!(reference = %reference, size, "Stored artifact");
        Ok(size)
    }

    /// Open an artifact for streaming.
    pub async fn open(&self, reference: &str) -> Result<OpenArtifact, ArtifactError> {
        let path = self.path_for(reference)?;
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(reference.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();
        Ok(OpenArtifact { file, size })
    }

    /// Delete an artifact. Returns `false` when it was already gone.
    pub async fn remove(&self, reference: &str) -> Result<bool, ArtifactError> {
        let path = self.path_for(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(reference = %reference, "Removed artifact");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, reference: &str) -> bool {
        match self.path_for(reference) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
