//! Fixed-capacity worker pool.
//!
//! A [`WorkerSlot`] is the permission to run one acquisition. Slots are
//! released when dropped, so a failing or panicking job still gives its
//! slot back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::metrics;

/// The pool was closed; no further slots are handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("worker pool is closed")]
pub struct PoolClosed;

#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    waiting: AtomicU64,
    total_acquired: AtomicU64,
}

impl PoolStats {
    fn publish(&self) {
        metrics::WORKER_POOL_ACTIVE.set(self.active.load(Ordering::Relaxed) as i64);
        metrics::WORKER_POOL_WAITING.set(self.waiting.load(Ordering::Relaxed) as i64);
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub capacity: usize,
    pub active: usize,
    pub waiting: usize,
    pub total_acquired: u64,
    pub closed: bool,
}

/// Bounded concurrency gate with a fixed number of slots.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// Create a pool with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait until a slot is free.
    pub async fn acquire(&self) -> Result<WorkerSlot, PoolClosed> {
        let waiting = WaitingGuard::new(Arc::clone(&self.stats));
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PoolClosed)?;
        drop(waiting);
        Ok(WorkerSlot::new(permit, Arc::clone(&self.stats)))
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> Result<Option<WorkerSlot>, PoolClosed> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(Some(WorkerSlot::new(permit, Arc::clone(&self.stats)))),
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(TryAcquireError::Closed) => Err(PoolClosed),
        }
    }

    /// Stop handing out slots. Pending and future `acquire` calls fail;
    /// slots already held stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn active(&self) -> usize {
        self.stats.active.load(Ordering::Relaxed) as usize
    }

    pub fn waiting(&self) -> usize {
        self.stats.waiting.load(Ordering::Relaxed) as usize
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            capacity: self.capacity,
            active: self.active(),
            waiting: self.waiting(),
            total_acquired: self.stats.total_acquired.load(Ordering::Relaxed),
            closed: self.is_closed(),
        }
    }
}

/// Counts a task as waiting for as long as it is parked in `acquire`,
/// including when the acquiring future is cancelled.
struct WaitingGuard(Arc<PoolStats>);

impl WaitingGuard {
    fn new(stats: Arc<PoolStats>) -> Self {
        stats.waiting.fetch_add(1, Ordering::Relaxed);
        stats.publish();
        Self(stats)
    }
}

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        self.0.waiting.fetch_sub(1, Ordering::Relaxed);
        self.0.publish();
    }
}

/// One held worker slot.
pub struct WorkerSlot {
    _permit: OwnedSemaphorePermit,
    stats: Arc<PoolStats>,
}

impl WorkerSlot {
    fn new(permit: OwnedSemaphorePermit, stats: Arc<PoolStats>) -> Self {
        stats.active.fetch_add(1, Ordering::Relaxed);
        stats.total_acquired.fetch_add(1, Ordering::Relaxed);
        stats.publish();
        Self {
            _permit: permit,
            stats,
        }
    }

    /// Give the slot back. Equivalent to dropping it.
    pub fn release(self) {}
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
        self.stats.publish();
    }
}
