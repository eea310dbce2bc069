//! Server configuration types
//!
//! Deserialized from `config/default.toml` plus overrides, then converted
//! into the core's `ControllerConfig` and `ReconcilerConfig`.

use runbridge_core::{BackoffConfig, ControllerConfig, ReconcilerConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerAppConfig,
    #[serde(default)]
    pub store: StoreAppConfig,
}

/// Controller configuration (exposed to TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerAppConfig {
    /// Concurrent reconcile workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Limit for one reconcile attempt
    #[serde(default = "default_attempt_deadline_secs")]
    pub attempt_deadline_secs: u64,
    /// Limit for one store call
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// Requeue delay for running invocations
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Period of the full re-enqueue
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
    /// How long a referenced build may be missing
    #[serde(default = "default_dependency_grace_secs")]
    pub dependency_grace_secs: u64,
    #[serde(default)]
    pub backoff: BackoffAppConfig,
}

impl Default for ControllerAppConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            attempt_deadline_secs: default_attempt_deadline_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            resync_interval_secs: default_resync_interval_secs(),
            dependency_grace_secs: default_dependency_grace_secs(),
            backoff: BackoffAppConfig::default(),
        }
    }
}

impl ControllerAppConfig {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig::default()
            .with_workers(self.workers)
            .with_attempt_deadline(Duration::from_secs(self.attempt_deadline_secs))
            .with_resync_interval(Duration::from_secs(self.resync_interval_secs))
            .with_backoff(self.backoff.backoff_config())
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig::default()
            .with_io_timeout(Duration::from_secs(self.io_timeout_secs))
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_dependency_grace(Duration::from_secs(self.dependency_grace_secs))
    }
}

fn default_workers() -> usize {
    4
}
fn default_attempt_deadline_secs() -> u64 {
    60
}
fn default_io_timeout_secs() -> u64 {
    10
}
fn default_poll_interval_secs() -> u64 {
    30
}
fn default_resync_interval_secs() -> u64 {
    300
}
fn default_dependency_grace_secs() -> u64 {
    60
}

/// Per-key retry backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffAppConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for BackoffAppConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: true,
        }
    }
}

impl BackoffAppConfig {
    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig::new()
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_multiplier(self.multiplier)
            .with_jitter(self.jitter)
    }
}

fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    300_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_true() -> bool {
    true
}

/// Object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreAppConfig {
    /// Watch events buffered per subscriber before it lags
    #[serde(default = "default_watch_capacity")]
    pub watch_capacity: usize,
    /// Manifests loaded into the store at startup
    #[serde(default)]
    pub manifests_dir: Option<PathBuf>,
}

impl Default for StoreAppConfig {
    fn default() -> Self {
        Self {
            watch_capacity: default_watch_capacity(),
            manifests_dir: None,
        }
    }
}

fn default_watch_capacity() -> usize {
    1024
}
