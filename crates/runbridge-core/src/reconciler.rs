//! Reconciler
//!
//! One level-triggered pass over a single invocation. Every pass starts
//! from a cold read, so duplicated or coalesced notifications are harmless:
//!
//! ```text
//! Unvalidated ─┬─> Rejected (terminal)
//!              └─> AwaitingExecution ─> Running ─┬─> Succeeded (terminal)
//!                                                └─> Failed (terminal)
//! ```

use crate::error::{Error, Result};
use crate::mirror::{mirror, reasons, StatusPatch};
use crate::store::ObjectStore;
use crate::tracker::ExecutionTracker;
use crate::translate::translate;
use crate::utils::with_deadline;
use crate::validation::{validate, BuildTarget};
use chrono::{DateTime, Utc};
use runbridge_api::{Invocation, ObjectKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reconciler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Limit for each store call
    pub io_timeout: Duration,
    /// Requeue delay for invocations that are still running
    pub poll_interval: Duration,
    /// How long a missing build is waited for, from invocation creation
    pub dependency_grace: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(30),
            dependency_grace: Duration::from_secs(60),
        }
    }
}

impl ReconcilerConfig {
    /// Set the store call limit
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the missing build grace period
    #[must_use]
    pub fn with_dependency_grace(mut self, grace: Duration) -> Self {
        self.dependency_grace = grace;
        self
    }
}

/// What the controller should do with a key after a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing left to do until the next notification
    Done,
    /// Look again after the delay, watch or no watch
    RequeueAfter(Duration),
}

/// Drives one invocation towards its execution's state
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    tracker: ExecutionTracker,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a reconciler over `store`
    pub fn new(store: Arc<dyn ObjectStore>, config: ReconcilerConfig) -> Self {
        let tracker = ExecutionTracker::new(Arc::clone(&store), config.io_timeout);
        Self {
            store,
            tracker,
            config,
        }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Run one pass for the invocation at `key`
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Action> {
        let invocation = with_deadline("get invocation", self.config.io_timeout, async {
            Ok(self.store.get_invocation(key).await?)
        })
        .await?;

        let Some(invocation) = invocation else {
            debug!(namespace = %key.namespace, name = %key.name, "Invocation gone");
            return Ok(Action::Done);
        };

        if invocation.status.is_terminal() {
            debug!(namespace = %key.namespace, name = %key.name, "Invocation already terminal");
            return Ok(Action::Done);
        }

        let accepted = match validate(&invocation) {
            Ok(accepted) => accepted,
            Err(errors) => {
                let err = Error::from(errors);
                warn!(
                    namespace = %key.namespace,
                    name = %key.name,
                    error = %err,
                    "Rejected invocation"
                );
                return self.finish(&invocation, &err).await;
            }
        };

        let desired = translate(&invocation, &accepted);
        let existing = self.tracker.find(&desired.key()).await?;

        if existing.is_none() {
            if let BuildTarget::Reference { name } = &accepted.target {
                if let Err(err) = self.require_build(key, name).await {
                    return self.wait_for_build(&invocation, err, Utc::now()).await;
                }
            }
        }

        let execution = match self.tracker.ensure_execution(&invocation, desired).await {
            Ok(tracked) => tracked.execution,
            Err(err @ Error::NotOwned { .. }) => {
                warn!(namespace = %key.namespace, name = %key.name, error = %err, "Execution conflict");
                return self.finish(&invocation, &err).await;
            }
            Err(err) => return Err(err),
        };

        let Some(patch) = mirror(&invocation.status, Some(&execution.status)) else {
            return Ok(Action::Done);
        };
        self.write_status(&invocation, &patch).await?;

        if patch.is_terminal() {
            Ok(Action::Done)
        } else {
            Ok(Action::RequeueAfter(self.config.poll_interval))
        }
    }

    async fn require_build(&self, key: &ObjectKey, name: &str) -> Result<()> {
        let build_key = ObjectKey::new(key.namespace.clone(), name);
        let build = with_deadline("get build", self.config.io_timeout, async {
            Ok(self.store.get_build(&build_key).await?)
        })
        .await?;

        match build {
            Some(_) => Ok(()),
            None => Err(Error::DependencyNotFound {
                namespace: build_key.namespace,
                name: build_key.name,
            }),
        }
    }

    /// Surface a missing build, and give up once the grace period is over
    async fn wait_for_build(
        &self,
        invocation: &Invocation,
        err: Error,
        now: DateTime<Utc>,
    ) -> Result<Action> {
        if !matches!(err, Error::DependencyNotFound { .. }) {
            return Err(err);
        }

        let expired = invocation
            .metadata
            .creation_timestamp
            .and_then(|created| (now - created).to_std().ok())
            .is_some_and(|elapsed| elapsed >= self.config.dependency_grace);

        if expired {
            warn!(
                namespace = %invocation.metadata.namespace,
                name = %invocation.metadata.name,
                error = %err,
                "Build did not appear within the grace period"
            );
            return self.finish(invocation, &err).await;
        }

        self.write_status(invocation, &StatusPatch::awaiting(err.to_string()))
            .await?;
        Err(err)
    }

    /// Write the terminal status for an error that ends the invocation
    async fn finish(&self, invocation: &Invocation, err: &Error) -> Result<Action> {
        let reason = err.terminal_reason().unwrap_or(reasons::FAILED);
        let message = match err {
            Error::Validation(errors) => errors.to_string(),
            other => other.to_string(),
        };
        self.write_status(invocation, &StatusPatch::rejected(reason, message))
            .await?;
        Ok(Action::Done)
    }

    /// Apply `patch` and write the status if anything changed
    async fn write_status(&self, invocation: &Invocation, patch: &StatusPatch) -> Result<bool> {
        let mut next = invocation.clone();
        let changed = patch.apply(&mut next.status, Utc::now());
        let generation = invocation.metadata.generation;
        if !changed && next.status.observed_generation == generation {
            return Ok(false);
        }
        next.status.observed_generation = generation;

        with_deadline("update invocation status", self.config.io_timeout, async {
            Ok(self.store.update_invocation_status(&next).await?)
        })
        .await?;

        info!(
            namespace = %invocation.metadata.namespace,
            name = %invocation.metadata.name,
            status = %patch.condition.status,
            reason = %patch.condition.reason,
            "Updated invocation status"
        );
        Ok(true)
    }
}
