use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Dispatcher pool capacity and tick interval are non-zero
/// - The staleness threshold outlasts the acquisition timeout
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let dispatcher = &config.dispatcher;
    if dispatcher.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher.max_concurrent_jobs must be at least 1".to_string(),
        ));
    }

    if dispatcher.tick_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher.tick_interval_ms cannot be 0".to_string(),
        ));
    }

    // A job whose pipeline may still be running must never be reclaimed.
    if let Some(stale_after) = dispatcher.stale_after_secs {
        if stale_after <= config.acquisition.timeout_secs {
            return Err(ConfigError::ValidationError(format!(
                "dispatcher.stale_after_secs ({}) must be greater than acquisition.timeout_secs ({})",
                stale_after, config.acquisition.timeout_secs
            )));
        }
    }

    Ok(())
}
