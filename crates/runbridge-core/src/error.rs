//! Error types for runbridge-core
//!
//! The reconciler sorts every failure into one of these buckets; the queue
//! only needs [`Error::is_retryable`] to decide what happens next.

use crate::mirror::reasons;
use crate::store::StoreError;
use crate::validation::ValidationErrors;
use runbridge_api::ObjectKey;
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invocation violates the accepted grammar
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Optimistic concurrency mismatch or a lost create race
    #[error("conflict on {kind} {key}: {message}")]
    Conflict {
        /// Object kind
        kind: &'static str,
        /// Object key
        key: ObjectKey,
        /// Detailed message
        message: String,
    },

    /// I/O failure against the object store
    #[error("transient error: {0}")]
    Transient(String),

    /// A store call or a whole attempt ran out of time
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// What was running
        operation: String,
        /// Limit that was exceeded
        timeout_ms: u64,
    },

    /// Referenced build does not exist (yet)
    #[error("build {namespace}/{name} not found")]
    DependencyNotFound {
        /// Build namespace
        namespace: String,
        /// Build name
        name: String,
    },

    /// An execution with the derived name exists but belongs to someone else
    #[error("execution {key} exists and is not owned by this invocation")]
    NotOwned {
        /// Execution key
        key: ObjectKey,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the reconciliation should be retried with backoff
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Conflict { .. }
                | Error::Transient(_)
                | Error::Timeout { .. }
                | Error::DependencyNotFound { .. }
        )
    }

    /// Condition reason written when this error ends an invocation
    #[must_use]
    pub fn terminal_reason(&self) -> Option<&'static str> {
        match self {
            Error::Validation(_) => Some(reasons::VALIDATION_FAILED),
            Error::DependencyNotFound { .. } => Some(reasons::BUILD_NOT_FOUND),
            Error::NotOwned { .. } => Some(reasons::EXECUTION_CONFLICT),
            _ => None,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists { kind, key } => Error::Conflict {
                kind,
                key,
                message: "object already exists".to_string(),
            },
            StoreError::Conflict {
                kind,
                key,
                expected,
                actual,
            } => Error::Conflict {
                kind,
                key,
                message: format!("resource version {expected} is stale, current is {actual}"),
            },
            StoreError::NotFound { .. } | StoreError::Unavailable(_) => {
                Error::Transient(err.to_string())
            }
        }
    }
}
