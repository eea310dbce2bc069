//! Utility modules for runbridge-core
//!
//! - backoff: Exponential backoff with jitter for the work queue
//! - deadline: Bounding store calls with a timeout

mod backoff;
mod deadline;

pub use backoff::BackoffConfig;
pub use deadline::with_deadline;
