//! Job dispatcher for bounded-concurrency track acquisition.
//!
//! On every tick the dispatcher:
//! - **Discovers** up to K queued jobs, oldest first (K = worker pool capacity)
//! - **Claims** each one with a compare-and-set to `downloading`, committed
//!   before any work starts
//! - **Dispatches** each claimed job to its own task, which waits for a
//!   worker slot and runs metadata lookup plus the acquisition pipeline

mod config;
mod pool;
mod runner;
mod ticker;
mod types;

pub use config::DispatcherConfig;
pub use pool::{PoolClosed, PoolStatus, WorkerPool, WorkerSlot};
pub use runner::Dispatcher;
pub use ticker::{IntervalTicker, ManualTicker, ManualTickerHandle, Ticker};
pub use types::{DispatcherError, DispatcherStatus, JobCounts, TickReport};
