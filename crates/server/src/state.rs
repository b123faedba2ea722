use std::sync::Arc;

use groovio_core::{ArtifactStore, Config, Dispatcher, JobStore, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    job_store: Arc<dyn JobStore>,
    artifacts: ArtifactStore,
    dispatcher: Option<Arc<Dispatcher>>,
}

impl AppState {
    pub fn new(
        config: Config,
        job_store: Arc<dyn JobStore>,
        artifacts: ArtifactStore,
        dispatcher: Option<Arc<Dispatcher>>,
    ) -> Self {
        Self {
            config,
            job_store,
            artifacts,
            dispatcher,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn job_store(&self) -> &Arc<dyn JobStore> {
        &self.job_store
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// The dispatcher, if it was started for this process.
    pub fn dispatcher(&self) -> Option<&Arc<Dispatcher>> {
        self.dispatcher.as_ref()
    }
}
