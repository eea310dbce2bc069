//! Exponential backoff with jitter
//!
//! Delay for failure number `n` (1-based) is
//! `initial_delay * multiplier^(n-1)`, capped at `max_delay`, plus up to
//! 25% jitter.

use std::time::Duration;

/// Attempts past this add nothing once the delay hits the cap.
const MAX_EXPONENT: u32 = 64;

/// Configuration for per-key backoff
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Upper bound for the delay, before jitter
    pub max_delay: Duration,
    /// Multiplier applied per consecutive failure
    pub multiplier: f64,
    /// Add random jitter to delays
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl BackoffConfig {
    /// Create a new backoff configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set initial delay
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retrying after `failures` consecutive failures
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.clamp(1, MAX_EXPONENT) - 1;
        let base_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.max(1.0).powi(exponent as i32);
        let delay_ms = base_ms.min(self.max_delay.as_millis() as f64) as u64;

        let final_delay = if self.jitter {
            // Up to 25%
            delay_ms + rand_jitter(delay_ms / 4)
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }
}

/// Pseudo-random jitter from the clock's sub-second nanos
fn rand_jitter(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);
    nanos % max
}
