//! Execution tracker
//!
//! Ensures each invocation has exactly one execution request. The request
//! is created at most once and its spec is never rewritten, with a single
//! exception: a changed timeout is propagated while the build engine has
//! not started the execution.

use crate::error::{Error, Result};
use crate::store::ObjectStore;
use crate::utils::with_deadline;
use runbridge_api::{ExecutionRequest, Invocation, ObjectKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Execution found or created for an invocation
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedExecution {
    /// Stored execution request
    pub execution: ExecutionRequest,
    /// Whether this call created it
    pub created: bool,
}

/// Finds and creates execution requests
pub struct ExecutionTracker {
    store: Arc<dyn ObjectStore>,
    io_timeout: Duration,
}

impl ExecutionTracker {
    /// Create a tracker; every store call is bounded by `io_timeout`
    pub fn new(store: Arc<dyn ObjectStore>, io_timeout: Duration) -> Self {
        Self { store, io_timeout }
    }

    /// Look up an execution by key
    pub async fn find(&self, key: &ObjectKey) -> Result<Option<ExecutionRequest>> {
        with_deadline("get execution", self.io_timeout, async {
            Ok(self.store.get_execution(key).await?)
        })
        .await
    }

    /// Make sure `desired` exists for `invocation`.
    ///
    /// Fails with [`Error::NotOwned`] when an execution with the same key
    /// belongs to another object, and with [`Error::Conflict`] when a
    /// concurrent create won the race.
    pub async fn ensure_execution(
        &self,
        invocation: &Invocation,
        desired: ExecutionRequest,
    ) -> Result<TrackedExecution> {
        let key = desired.key();

        let Some(existing) = self.find(&key).await? else {
            let execution = with_deadline("create execution", self.io_timeout, async {
                Ok(self.store.create_execution(desired).await?)
            })
            .await?;
            info!(
                namespace = %key.namespace,
                name = %key.name,
                "Created execution"
            );
            return Ok(TrackedExecution {
                execution,
                created: true,
            });
        };

        if !existing.metadata.is_owned_by(&invocation.metadata.uid) {
            return Err(Error::NotOwned { key });
        }

        if existing.status.has_started() || existing.spec.timeout == desired.spec.timeout {
            debug!(namespace = %key.namespace, name = %key.name, "Execution up to date");
            return Ok(TrackedExecution {
                execution: existing,
                created: false,
            });
        }

        let mut next = existing;
        next.spec.timeout = desired.spec.timeout;
        let execution = with_deadline("update execution", self.io_timeout, async {
            Ok(self.store.update_execution_spec(&next).await?)
        })
        .await?;
        info!(
            namespace = %key.namespace,
            name = %key.name,
            timeout = ?execution.spec.timeout.map(|t| t.to_string()),
            "Propagated timeout to pending execution"
        );

        Ok(TrackedExecution {
            execution,
            created: false,
        })
    }
}
