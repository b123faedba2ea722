//! Dispatcher configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the job dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Enable/disable the dispatcher.
    /// When disabled, queued jobs stay queued.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How often to look for queued jobs (milliseconds).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Worker pool capacity. Also the max number of jobs claimed per tick.
    /// Fixed for the process lifetime.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Reclaim `downloading` jobs not updated for this long (seconds).
    /// Unset disables the staleness sweeper.
    #[serde(default)]
    pub stale_after_secs: Option<u64>,

    /// How long `stop()` waits for in-flight jobs (milliseconds).
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_tick_interval() -> u64 {
    60_000 // 1 minute
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_shutdown_grace() -> u64 {
    5_000
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tick_interval_ms: default_tick_interval(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            stale_after_secs: None,
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}
