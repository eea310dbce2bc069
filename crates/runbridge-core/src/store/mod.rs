//! Object store
//!
//! The adapter reaches the cluster-state store only through [`ObjectStore`]:
//! - Optimistic concurrency: writes carry the `resourceVersion` last read
//! - Status-only writes for invocations, create-only for executions
//! - A broadcast watch stream of change notifications
//!
//! [`InMemoryStore`] implements the trait for development and tests, and
//! also exposes the writes that belong to the orchestrator (creating and
//! deleting invocations) and the build engine (writing execution status).

mod memory;
mod watch;

pub use memory::InMemoryStore;
pub use watch::{WatchBus, WatchEvent};

use async_trait::async_trait;
use runbridge_api::{Build, ExecutionRequest, Invocation, ObjectKey};
use thiserror::Error;
use tokio::sync::broadcast;

/// Store error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Object does not exist
    #[error("{kind} {key} not found")]
    NotFound {
        /// Object kind
        kind: &'static str,
        /// Object key
        key: ObjectKey,
    },

    /// Create of an object that already exists
    #[error("{kind} {key} already exists")]
    AlreadyExists {
        /// Object kind
        kind: &'static str,
        /// Object key
        key: ObjectKey,
    },

    /// Write carried a stale resource version
    #[error("{kind} {key} was modified: expected version {expected}, found {actual}")]
    Conflict {
        /// Object kind
        kind: &'static str,
        /// Object key
        key: ObjectKey,
        /// Version the writer read
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Store unreachable, throttled or otherwise failing
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Backing store for invocations, executions and builds
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every invocation
    async fn list_invocations(&self) -> StoreResult<Vec<Invocation>>;

    /// Get an invocation by key
    async fn get_invocation(&self, key: &ObjectKey) -> StoreResult<Option<Invocation>>;

    /// Replace the status of an invocation.
    ///
    /// Fails with [`StoreError::Conflict`] when `invocation` was read at an
    /// older version than the stored one.
    async fn update_invocation_status(&self, invocation: &Invocation) -> StoreResult<Invocation>;

    /// Get an execution by key
    async fn get_execution(&self, key: &ObjectKey) -> StoreResult<Option<ExecutionRequest>>;

    /// Create an execution; [`StoreError::AlreadyExists`] if the key is taken
    async fn create_execution(&self, execution: ExecutionRequest) -> StoreResult<ExecutionRequest>;

    /// Replace the spec of an execution, under optimistic concurrency
    async fn update_execution_spec(
        &self,
        execution: &ExecutionRequest,
    ) -> StoreResult<ExecutionRequest>;

    /// Get a build by key
    async fn get_build(&self, key: &ObjectKey) -> StoreResult<Option<Build>>;

    /// Subscribe to change notifications
    fn watch(&self) -> broadcast::Receiver<WatchEvent>;
}
