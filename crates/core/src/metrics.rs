//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job lifecycle (queued, claimed, completed, failed, reclaimed)
//! - Worker pool occupancy
//! - Acquisition duration

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntGauge};

// =============================================================================
// Job Lifecycle Metrics
// =============================================================================

/// Jobs created total.
pub static JOBS_QUEUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("groovio_jobs_queued_total", "Total jobs created in queued state").unwrap()
});

/// Jobs claimed (queued -> downloading) total.
pub static JOBS_CLAIMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "groovio_jobs_claimed_total",
        "Total jobs claimed by the dispatcher",
    )
    .unwrap()
});

/// Claims lost because the job was no longer queued.
pub static CLAIM_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "groovio_claim_conflicts_total",
        "Total claims that lost a compare-and-set race",
    )
    .unwrap()
});

/// Jobs completed total.
pub static JOBS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "groovio_jobs_completed_total",
        "Total jobs completed successfully",
    )
    .unwrap()
});

/// Jobs failed total.
pub static JOBS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("groovio_jobs_failed_total", "Total jobs that failed").unwrap()
});

/// Downloading jobs moved back to queued (startup recovery, stale sweep, shutdown).
pub static JOBS_RECLAIMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "groovio_jobs_reclaimed_total",
        "Total downloading jobs returned to queued",
    )
    .unwrap()
});

// =============================================================================
// Worker Pool Metrics
// =============================================================================

/// Worker slots currently held.
pub static WORKER_POOL_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "groovio_worker_pool_active",
        "Number of worker slots currently held",
    )
    .unwrap()
});

/// Tasks waiting for a worker slot.
pub static WORKER_POOL_WAITING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "groovio_worker_pool_waiting",
        "Number of tasks waiting for a worker slot",
    )
    .unwrap()
});

// =============================================================================
// Acquisition Metrics
// =============================================================================

/// Acquisition duration in seconds.
pub static ACQUISITION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "groovio_acquisition_duration_seconds",
            "Duration of metadata lookup plus acquisition pipeline",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["result"], // "success", "failed", "panicked"
    )
    .unwrap()
});

/// All core metrics, for registration in the server's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_QUEUED.clone()),
        Box::new(JOBS_CLAIMED.clone()),
        Box::new(CLAIM_CONFLICTS.clone()),
        Box::new(JOBS_COMPLETED.clone()),
        Box::new(JOBS_FAILED.clone()),
        Box::new(JOBS_RECLAIMED.clone()),
        // Worker pool
        Box::new(WORKER_POOL_ACTIVE.clone()),
        Box::new(WORKER_POOL_WAITING.clone()),
        // Acquisition
        Box::new(ACQUISITION_DURATION.clone()),
    ]
}
