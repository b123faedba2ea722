//! Mock acquisition pipeline for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::acquisition::{AcquisitionError, AcquisitionPipeline, Artifact};
use crate::media::ArtifactStore;
use crate::metadata::TrackMetadata;

/// Mock implementation of the AcquisitionPipeline trait.
///
/// Provides controllable behavior for testing:
/// - Fail or panic for specific track ids
/// - Simulate slow acquisitions
/// - Track the maximum number of concurrent invocations
/// - Optionally write real artifact files into an [`ArtifactStore`]
///
/// # Example
///
/// ```rust,ignore
/// use groovio_core::testing::MockAcquisitionPipeline;
///
/// let pipeline = MockAcquisitionPipeline::new().with_delay(Duration::from_millis(50));
/// pipeline.fail_track("track-b").await;
///
/// // ... run the dispatcher ...
///
/// assert!(pipeline.max_in_flight() <= 2);
/// ```
#[derive(Debug)]
pub struct MockAcquisitionPipeline {
    /// Track ids that fail.
    failing: Arc<RwLock<HashSet<String>>>,
    /// Track ids that panic.
    panicking: Arc<RwLock<HashSet<String>>>,
    /// If set, the next acquisition fails with this error.
    next_error: Arc<RwLock<Option<AcquisitionError>>>,
    /// Track ids in invocation order.
    calls: Arc<RwLock<Vec<String>>>,
    /// Simulated acquisition duration.
    delay: Duration,
    /// Where to write artifact files, if anywhere.
    store: Option<ArtifactStore>,
    /// Bytes written for each artifact.
    content: Vec<u8>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockAcquisitionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter even when the acquisition panics.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockAcquisitionPipeline {
    /// Create a new mock pipeline that succeeds immediately.
    pub fn new() -> Self {
        Self {
            failing: Arc::new(RwLock::new(HashSet::new())),
            panicking: Arc::new(RwLock::new(HashSet::new())),
            next_error: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
            delay: Duration::ZERO,
            store: None,
            content: b"ID3 mock audio".to_vec(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulate acquisitions taking `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Write `content` into `store` for every successful acquisition.
    pub fn with_artifact_store(mut self, store: ArtifactStore, content: impl Into<Vec<u8>>) -> Self {
        self.store = Some(store);
        self.content = content.into();
        self
    }

    /// Make every acquisition of `track_id` fail.
    pub async fn fail_track(&self, track_id: impl Into<String>) {
        self.failing.write().await.insert(track_id.into());
    }

    /// Make every acquisition of `track_id` panic.
    pub async fn panic_on_track(&self, track_id: impl Into<String>) {
        self.panicking.write().await.insert(track_id.into());
    }

    /// Set an error to return on the next acquisition.
    pub async fn set_next_error(&self, error: AcquisitionError) {
        *self.next_error.write().await = Some(error);
    }

    /// Track ids passed to `acquire`, in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    /// Number of acquisitions for one track id.
    pub async fn call_count(&self, track_id: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|id| id.as_str() == track_id)
            .count()
    }

    /// Acquisitions running right now.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous acquisitions observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionPipeline for MockAcquisitionPipeline {
    fn name(&self) -> &str {
        "mock"
    }

    async fn acquire(&self, track: &TrackMetadata) -> Result<Artifact, AcquisitionError> {
        let track_id = track.external_track_id.clone();
        self.calls.write().await.push(track_id.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(Arc::clone(&self.in_flight));
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.panicking.read().await.contains(&track_id) {
            panic!("mock pipeline panic for {}", track_id);
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        if self.failing.read().await.contains(&track_id) {
            return Err(AcquisitionError::Other(format!(
                "mock failure for {}",
                track_id
            )));
        }

        let reference = format!("{}.mp3", uuid::Uuid::new_v4());
        let size_bytes = match &self.store {
            Some(store) => {
                let path = store.path_for(&reference)?;
                tokio::fs::write(&path, &self.content).await?;
                self.content.len() as u64
            }
            None => 0,
        };

        Ok(Artifact {
            reference,
            size_bytes,
        })
    }
}
