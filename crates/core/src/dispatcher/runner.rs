//! Dispatcher implementation.
//!
//! The tick loop owns discovery and claiming; each claimed job runs in its
//! own task on a [`TaskTracker`], bounded by the shared [`WorkerPool`].

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::acquisition::{AcquisitionError, AcquisitionPipeline, Artifact};
use crate::job::{JobOrder, JobRecord, JobStatus, JobStore};
use crate::metadata::{MetadataProvider, TrackMetadata};
use crate::metrics;

use super::config::DispatcherConfig;
use super::pool::WorkerPool;
use super::ticker::{IntervalTicker, Ticker};
use super::types::{DispatcherError, DispatcherStatus, JobCounts, TickReport};

/// Page size when returning orphaned jobs to the queue at startup.
const RECOVERY_BATCH: usize = 100;

/// State shared by the tick loop and every job task.
struct DispatchCore {
    config: DispatcherConfig,
    store: Arc<dyn JobStore>,
    metadata: Arc<dyn MetadataProvider>,
    pipeline: Arc<dyn AcquisitionPipeline>,
    pool: Arc<WorkerPool>,
    tasks: TaskTracker,
    /// Ids claimed by this process whose task has not finished yet.
    held: std::sync::Mutex<HashSet<String>>,
}

/// Drops a job id from the held set once its task ends, however it ends.
struct HeldClaim {
    core: Arc<DispatchCore>,
    job_id: String,
}

impl Drop for HeldClaim {
    fn drop(&mut self) {
        self.core.held_ids().remove(&self.job_id);
    }
}

/// Periodically claims queued jobs and runs them on the worker pool.
pub struct Dispatcher {
    core: Arc<DispatchCore>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Create a new dispatcher. The worker pool is created once by the
    /// caller; its capacity is also the per-tick claim limit.
    pub fn new(
        config: DispatcherConfig,
        store: Arc<dyn JobStore>,
        metadata: Arc<dyn MetadataProvider>,
        pipeline: Arc<dyn AcquisitionPipeline>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            core: Arc::new(DispatchCore {
                config,
                store,
                metadata,
                pipeline,
                pool,
                tasks: TaskTracker::new(),
                held: std::sync::Mutex::new(HashSet::new()),
            }),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            loop_handle: Mutex::new(None),
        }
    }

    /// Start the tick loop on a wall-clock interval.
    pub async fn start(&self) -> Result<(), DispatcherError> {
        let period = Duration::from_millis(self.core.config.tick_interval_ms);
        self.start_with_ticker(IntervalTicker::new(period)).await
    }

    /// Start the tick loop driven by `ticker`.
    ///
    /// Jobs left `downloading` by a previous process are returned to
    /// `queued` first: no task of this process owns them.
    pub async fn start_with_ticker<T>(&self, ticker: T) -> Result<(), DispatcherError>
    where
        T: Ticker + 'static,
    {
        if self.core.pool.is_closed() {
            return Err(DispatcherError::Stopped);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Dispatcher already running");
            return Err(DispatcherError::AlreadyRunning);
        }

        info!(
            capacity = self.core.pool.capacity(),
            tick_interval_ms = self.core.config.tick_interval_ms,
            pipeline = self.core.pipeline.name(),
            "Starting dispatcher"
        );

        if self.core.tasks.is_empty() {
            match self.recover_orphans() {
                Ok(0) => {}
                Ok(n) => info!("Recovered {} orphaned downloading jobs", n),
                Err(e) => warn!("Orphan recovery failed: {}", e),
            }
        } else {
            warn!("Skipping orphan recovery: jobs already in flight");
        }

        self.spawn_tick_loop(ticker).await;

        info!("Dispatcher started");
        Ok(())
    }

    /// Stop the loop, close the worker pool and wait up to the configured
    /// grace period for in-flight jobs.
    ///
    /// Jobs still waiting for a slot are returned to `queued`. Jobs still
    /// running after the grace period stay `downloading` and are recovered
    /// on the next start.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Dispatcher not running");
            return;
        }

        info!("Stopping dispatcher");

        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.loop_handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Dispatcher loop ended abnormally: {}", e);
            }
        }

        self.core.pool.close();
        self.core.tasks.close();

        let grace = Duration::from_millis(self.core.config.shutdown_grace_ms);
        if tokio::time::timeout(grace, self.core.tasks.wait())
            .await
            .is_err()
        {
            warn!(
                in_flight = self.core.tasks.len(),
                "Jobs still running after shutdown grace period"
            );
        }

        info!("Dispatcher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Run one discovery-and-claim cycle. Returns once claimed jobs are
    /// dispatched, without waiting for them to finish.
    pub async fn tick(&self) -> TickReport {
        self.core.tick().await
    }

    /// Move every `downloading` job back to `queued`.
    pub fn recover_orphans(&self) -> Result<usize, DispatcherError> {
        let store = &self.core.store;
        let mut recovered = 0;

        loop {
            let batch =
                store.find_eligible(JobStatus::Downloading, RECOVERY_BATCH, JobOrder::OldestFirst)?;
            if batch.is_empty() {
                break;
            }

            let mut progressed = false;
            for job in batch {
                if store.compare_and_set_status(&job.id, JobStatus::Downloading, JobStatus::Queued)? {
                    info!(
                        job_id = %job.id,
                        track_id = %job.external_track_id,
                        "Recovered orphaned job: downloading -> queued"
                    );
                    metrics::JOBS_RECLAIMED.inc();
                    recovered += 1;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        Ok(recovered)
    }

    /// Wait until every dispatched job task has finished.
    pub async fn wait_idle(&self) {
        self.core.tasks.close();
        self.core.tasks.wait().await;
        if !self.core.pool.is_closed() {
            self.core.tasks.reopen();
        }
    }

    /// The worker pool shared by all job tasks.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.core.pool
    }

    /// Get current dispatcher status.
    pub fn status(&self) -> Result<DispatcherStatus, DispatcherError> {
        let count = |status| -> Result<usize, DispatcherError> {
            Ok(self.core.store.count(Some(status))? as usize)
        };

        Ok(DispatcherStatus {
            running: self.is_running(),
            tick_interval_ms: self.core.config.tick_interval_ms,
            pool: self.core.pool.status(),
            in_flight: self.core.tasks.len(),
            jobs: JobCounts {
                queued: count(JobStatus::Queued)?,
                downloading: count(JobStatus::Downloading)?,
                completed: count(JobStatus::Completed)?,
                failed: count(JobStatus::Failed)?,
            },
        })
    }

    async fn spawn_tick_loop<T>(&self, mut ticker: T)
    where
        T: Ticker + 'static,
    {
        let core = Arc::clone(&self.core);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            info!("Dispatcher loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Dispatcher loop received shutdown signal");
                        break;
                    }
                    more = ticker.tick() => {
                        if !more || !running.load(Ordering::Relaxed) {
                            break;
                        }
                        core.tick().await;
                        ticker.tick_processed();
                    }
                }
            }
            info!("Dispatcher loop stopped");
        });

        *self.loop_handle.lock().await = Some(handle);
    }
}

impl DispatchCore {
    fn held_ids(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn tick(self: &Arc<Self>) -> TickReport {
        let mut report = TickReport {
            reclaimed: self.sweep_stale(),
            ..Default::default()
        };

        if self.pool.is_closed() {
            debug!("Worker pool closed, skipping tick");
            return report;
        }

        let jobs = match self.store.find_eligible(
            JobStatus::Queued,
            self.pool.capacity(),
            JobOrder::OldestFirst,
        ) {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Job discovery failed, retrying next tick: {}", e);
                return report;
            }
        };
        report.discovered = jobs.len();

        // Every claim is committed before anything is dispatched.
        let mut claimed = Vec::with_capacity(jobs.len());
        for job in jobs {
            match self
                .store
                .compare_and_set_status(&job.id, JobStatus::Queued, JobStatus::Downloading)
            {
                Ok(true) => {
                    metrics::JOBS_CLAIMED.inc();
                    self.held_ids().insert(job.id.clone());
                    info!(
                        job_id = %job.id,
                        track_id = %job.external_track_id,
                        "Job transition: queued -> downloading"
                    );
                    claimed.push(job);
                }
                Ok(false) => {
                    metrics::CLAIM_CONFLICTS.inc();
                    report.conflicts += 1;
                    debug!(job_id = %job.id, "Job already claimed elsewhere");
                }
                Err(e) => {
                    warn!(
                        job_id = %job.id,
                        "Failed to claim job, retrying next tick: {}",
                        e
                    );
                }
            }
        }
        report.claimed = claimed.len();

        for job in claimed {
            self.dispatch(job);
            report.dispatched += 1;
        }

        if report.discovered > 0 || report.reclaimed > 0 {
            debug!(?report, "Tick finished");
        }
        report
    }

    fn dispatch(self: &Arc<Self>, job: JobRecord) {
        let held = HeldClaim {
            core: Arc::clone(self),
            job_id: job.id.clone(),
        };
        self.tasks.spawn(async move {
            held.core.run_job(job).await;
            drop(held);
        });
    }

    async fn run_job(&self, job: JobRecord) {
        let slot = match self.pool.acquire().await {
            Ok(slot) => slot,
            Err(_) => {
                self.release_claim(&job);
                return;
            }
        };

        debug!(job_id = %job.id, "Acquired worker slot");
        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.acquire(&job)).catch_unwind().await;
        slot.release();
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(Ok((track, artifact))) => {
                metrics::ACQUISITION_DURATION
                    .with_label_values(&["success"])
                    .observe(elapsed);
                self.mark_completed(&job, &track, &artifact);
            }
            Ok(Err(e)) => {
                metrics::ACQUISITION_DURATION
                    .with_label_values(&["failed"])
                    .observe(elapsed);
                warn!(
                    job_id = %job.id,
                    track_id = %job.external_track_id,
                    error = %e,
                    "Acquisition failed"
                );
                self.mark_failed(&job);
            }
            Err(panic) => {
                metrics::ACQUISITION_DURATION
                    .with_label_values(&["panicked"])
                    .observe(elapsed);
                error!(
                    job_id = %job.id,
                    track_id = %job.external_track_id,
                    "Acquisition panicked: {}",
                    panic_message(panic.as_ref())
                );
                self.mark_failed(&job);
            }
        }
    }

    async fn acquire(&self, job: &JobRecord) -> Result<(TrackMetadata, Artifact), AcquisitionError> {
        let track = self.metadata.track(&job.external_track_id).await?;
        let artifact = self.pipeline.acquire(&track).await?;
        Ok((track, artifact))
    }

    fn mark_completed(&self, job: &JobRecord, track: &TrackMetadata, artifact: &Artifact) {
        match self
            .store
            .complete(&job.id, &artifact.reference, &track.summary())
        {
            Ok(true) => {
                metrics::JOBS_COMPLETED.inc();
                info!(
                    job_id = %job.id,
                    track_id = %job.external_track_id,
                    artifact = %artifact.reference,
                    "Job transition: downloading -> completed"
                );
            }
            Ok(false) => warn!(
                job_id = %job.id,
                artifact = %artifact.reference,
                "Job left downloading before it completed; artifact not recorded"
            ),
            Err(e) => error!(
                job_id = %job.id,
                "Failed to record completion, job stays downloading: {}",
                e
            ),
        }
    }

    fn mark_failed(&self, job: &JobRecord) {
        match self
            .store
            .compare_and_set_status(&job.id, JobStatus::Downloading, JobStatus::Failed)
        {
            Ok(true) => {
                metrics::JOBS_FAILED.inc();
                info!(
                    job_id = %job.id,
                    track_id = %job.external_track_id,
                    "Job transition: downloading -> failed"
                );
            }
            Ok(false) => warn!(job_id = %job.id, "Job left downloading before it failed"),
            Err(e) => error!(
                job_id = %job.id,
                "Failed to record failure, job stays downloading: {}",
                e
            ),
        }
    }

    /// Return a claimed job that never got a worker slot.
    fn release_claim(&self, job: &JobRecord) {
        match self
            .store
            .compare_and_set_status(&job.id, JobStatus::Downloading, JobStatus::Queued)
        {
            Ok(true) => {
                metrics::JOBS_RECLAIMED.inc();
                info!(
                    job_id = %job.id,
                    track_id = %job.external_track_id,
                    "Worker pool closed, job transition: downloading -> queued"
                );
            }
            Ok(false) => {}
            Err(e) => warn!(job_id = %job.id, "Failed to release claim: {}", e),
        }
    }

    fn sweep_stale(&self) -> usize {
        let Some(stale_after) = self.config.stale_after_secs else {
            return 0;
        };

        // Claims still owned by a task of this process are never stale.
        let held = self.held_ids().clone();
        let cutoff = Utc::now() - chrono::Duration::seconds(stale_after as i64);
        match self.store.reclaim_stale(cutoff, &held) {
            Ok(reclaimed) => {
                for job in &reclaimed {
                    metrics::JOBS_RECLAIMED.inc();
                    warn!(
                        job_id = %job.id,
                        track_id = %job.external_track_id,
                        "Stale job transition: downloading -> queued"
                    );
                }
                reclaimed.len()
            }
            Err(e) => {
                warn!("Stale job sweep failed: {}", e);
                0
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
