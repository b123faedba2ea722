//! Types for the job dispatcher.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pool::PoolStatus;

/// Errors that can occur when driving the dispatcher.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// `start` was called while the loop is running.
    #[error("dispatcher already running")]
    AlreadyRunning,

    /// The dispatcher was stopped; its worker pool is closed for good.
    #[error("dispatcher was stopped and cannot be restarted")]
    Stopped,

    /// Job store error.
    #[error("job store error: {0}")]
    JobStore(#[from] crate::job::JobError),
}

/// Outcome of one discovery-and-claim cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Downloading jobs returned to queued by the staleness sweeper.
    pub reclaimed: usize,
    /// Queued jobs returned by discovery.
    pub discovered: usize,
    /// Jobs moved to downloading by this tick.
    pub claimed: usize,
    /// Jobs another claimant moved first.
    pub conflicts: usize,
    /// Jobs handed to a task.
    pub dispatched: usize,
}

/// Job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub queued: usize,
    pub downloading: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Current status of the dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatcherStatus {
    /// Whether the tick loop is running.
    pub running: bool,
    /// Tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// Worker pool occupancy.
    pub pool: PoolStatus,
    /// Dispatched tasks not yet finished (waiting for or holding a slot).
    pub in_flight: usize,
    /// Jobs per status in the store.
    pub jobs: JobCounts,
}
