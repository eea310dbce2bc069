//! Configuration sanity checks

use super::config::AppConfig;
use anyhow::{bail, Result};
use tracing::warn;

/// Reject configurations the controller cannot run with
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let controller = &config.controller;

    if controller.workers == 0 {
        bail!("controller.workers must be at least 1");
    }
    if controller.attempt_deadline_secs == 0 || controller.io_timeout_secs == 0 {
        bail!("controller.attempt_deadline_secs and controller.io_timeout_secs must be positive");
    }
    if controller.poll_interval_secs == 0 || controller.resync_interval_secs == 0 {
        bail!("controller.poll_interval_secs and controller.resync_interval_secs must be positive");
    }
    if controller.backoff.multiplier < 1.0 {
        bail!("controller.backoff.multiplier must be at least 1.0");
    }
    if controller.backoff.initial_delay_ms > controller.backoff.max_delay_ms {
        bail!("controller.backoff.initial_delay_ms must not exceed max_delay_ms");
    }
    if config.store.watch_capacity == 0 {
        bail!("store.watch_capacity must be at least 1");
    }

    if controller.io_timeout_secs >= controller.attempt_deadline_secs {
        warn!(
            io_timeout_secs = controller.io_timeout_secs,
            attempt_deadline_secs = controller.attempt_deadline_secs,
            "A single store call can use up the whole attempt deadline"
        );
    }

    Ok(())
}
