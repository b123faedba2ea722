//! Persisted job records for track download attempts.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{JobError, JobFilter, JobStore};
pub use types::{JobOrder, JobRecord, JobStatus, TrackSummary};
