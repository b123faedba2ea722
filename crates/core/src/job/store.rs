//! Job storage trait and query types.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{JobOrder, JobRecord, JobStatus, TrackSummary};

/// Error type for job store operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// A job already exists for this external track id.
    #[error("a job for track {0} already exists")]
    Duplicate(String),

    /// Job not found.
    #[error("job not found: {0}")]
    NotFound(String),

    /// The state machine does not allow this transition.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for JobError {
    fn from(e: rusqlite::Error) -> Self {
        JobError::Database(e.to_string())
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub order: JobOrder,
    pub limit: i64,
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            order: JobOrder::OldestFirst,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_order(mut self, order: JobOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Persistent job storage.
///
/// The store is the single source of truth for "already claimed": every
/// status change is a compare-and-set on one record.
pub trait JobStore: Send + Sync {
    /// Create a `queued` job, failing with [`JobError::Duplicate`] if any job
    /// exists for the same external track id, whatever its status.
    fn create_if_absent(&self, external_track_id: &str) -> Result<JobRecord, JobError>;

    /// Get a job by id.
    fn get(&self, id: &str) -> Result<Option<JobRecord>, JobError>;

    /// Get the job for an external track id.
    fn get_by_track_id(&self, external_track_id: &str) -> Result<Option<JobRecord>, JobError>;

    /// Up to `limit` jobs in `status`, ordered on `created_at`.
    fn find_eligible(
        &self,
        status: JobStatus,
        limit: usize,
        order: JobOrder,
    ) -> Result<Vec<JobRecord>, JobError> {
        self.list(
            &JobFilter::new()
                .with_status(status)
                .with_order(order)
                .with_limit(limit as i64),
        )
    }

    /// List jobs matching the filter.
    fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, JobError>;

    /// Count jobs, optionally restricted to one status.
    fn count(&self, status: Option<JobStatus>) -> Result<i64, JobError>;

    /// Atomically move `id` from `expected` to `new`.
    ///
    /// Returns `Ok(false)` when the job is missing or not in `expected`.
    fn compare_and_set_status(
        &self,
        id: &str,
        expected: JobStatus,
        new: JobStatus,
    ) -> Result<bool, JobError>;

    /// Atomically move `id` from `downloading` to `completed`, recording the
    /// artifact reference and track summary.
    fn complete(
        &self,
        id: &str,
        artifact_reference: &str,
        track: &TrackSummary,
    ) -> Result<bool, JobError>;

    /// Current status for each known id; unknown ids are absent.
    fn statuses(&self, external_track_ids: &[String])
        -> Result<HashMap<String, JobStatus>, JobError>;

    /// Move `downloading` jobs last updated before `cutoff` back to `queued`,
    /// skipping any id in `held`. Returns the reclaimed jobs.
    fn reclaim_stale(
        &self,
        cutoff: DateTime<Utc>,
        held: &HashSet<String>,
    ) -> Result<Vec<JobRecord>, JobError>;

    /// Permanently delete a job, returning it.
    fn delete(&self, id: &str) -> Result<JobRecord, JobError>;
}
