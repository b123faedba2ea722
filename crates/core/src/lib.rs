pub mod acquisition;
pub mod config;
pub mod dispatcher;
pub mod job;
pub mod media;
pub mod metadata;
pub mod metrics;
pub mod testing;

pub use acquisition::{
    AcquisitionConfig, AcquisitionError, AcquisitionPipeline, Artifact, YtDlpPipeline,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use dispatcher::{
    Dispatcher, DispatcherConfig, DispatcherError, DispatcherStatus, IntervalTicker, ManualTicker,
    ManualTickerHandle, PoolClosed, PoolStatus, Ticker, TickReport, WorkerPool, WorkerSlot,
};
pub use job::{
    JobError, JobFilter, JobOrder, JobRecord, JobStatus, JobStore, SqliteJobStore, TrackSummary,
};
pub use media::{resolve_range, ArtifactError, ArtifactStore, RangeError, ServedRange};
pub use metadata::{MetadataError, MetadataProvider, SpotifyClient, SpotifyConfig, TrackMetadata};
