//! Runbridge Core - Admission and reconciliation engine
//!
//! This crate bridges orchestrator `Run` invocations to native `BuildRun`
//! executions:
//! - Validation: the accepted invocation grammar, with aggregated errors
//! - Translate: accepted invocation to execution request
//! - Tracker: one execution per invocation, created at most once
//! - Mirror: execution status back onto the invocation
//! - Reconciler / Controller: the level-triggered control loop
//! - Queue: keyed work queue with per-key backoff
//! - Store: the object store seam and an in-memory implementation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod controller;
pub mod error;
pub mod mirror;
pub mod queue;
pub mod reconciler;
pub mod shutdown;
pub mod store;
pub mod tracker;
pub mod translate;
pub mod utils;
pub mod validation;

pub use controller::{Controller, ControllerConfig};
pub use error::{Error, Result};
pub use mirror::{mirror, reasons, StatusPatch};
pub use queue::WorkQueue;
pub use reconciler::{Action, Reconciler, ReconcilerConfig};
pub use shutdown::{
    shutdown_signal_with_controller, wait_for_shutdown_signal, ShutdownController, ShutdownPhase,
    TaskGuard,
};
pub use store::{InMemoryStore, ObjectStore, StoreError, StoreResult, WatchBus, WatchEvent};
pub use tracker::{ExecutionTracker, TrackedExecution};
pub use translate::{execution_key, translate, LABEL_RUN, LABEL_RUN_UID};
pub use utils::BackoffConfig;
pub use validation::{
    validate, AcceptedInvocation, BuildTarget, FieldViolation, OverrideParam, ValidationErrors,
    PARAM_OUTPUT_IMAGE, PARAM_SOURCE_REVISION, PARAM_SOURCE_URL,
};
