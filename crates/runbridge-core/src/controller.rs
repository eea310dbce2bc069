//! Controller
//!
//! Feeds the work queue from the store's watch stream and drains it with a
//! pool of workers:
//! - Every invocation is enqueued at start, on watch lag and on each resync
//! - Execution changes enqueue the owning invocation
//! - Build changes enqueue the non-terminal invocations that reference it
//! - Workers run each attempt under a deadline and requeue with backoff

use crate::error::{Error, Result};
use crate::queue::WorkQueue;
use crate::reconciler::{Action, Reconciler};
use crate::store::{ObjectStore, WatchEvent};
use crate::utils::{with_deadline, BackoffConfig};
use runbridge_api::ObjectKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Controller configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Concurrent workers
    pub workers: usize,
    /// Limit for a whole reconcile attempt
    pub attempt_deadline: Duration,
    /// Period of the full re-enqueue
    pub resync_interval: Duration,
    /// Per-key backoff for failed attempts
    pub backoff: BackoffConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            attempt_deadline: Duration::from_secs(60),
            resync_interval: Duration::from_secs(300),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Set the worker count
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the attempt deadline
    #[must_use]
    pub fn with_attempt_deadline(mut self, deadline: Duration) -> Self {
        self.attempt_deadline = deadline;
        self
    }

    /// Set the resync interval
    #[must_use]
    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Set the backoff
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Watch-driven control loop around a [`Reconciler`]
pub struct Controller {
    reconciler: Arc<Reconciler>,
    store: Arc<dyn ObjectStore>,
    queue: Arc<WorkQueue<ObjectKey>>,
    config: ControllerConfig,
}

impl Controller {
    /// Create a controller
    pub fn new(reconciler: Reconciler, store: Arc<dyn ObjectStore>, config: ControllerConfig) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            store,
            queue: Arc::new(WorkQueue::new(config.backoff.clone())),
            config,
        }
    }

    /// The work queue
    #[must_use]
    pub fn queue(&self) -> &Arc<WorkQueue<ObjectKey>> {
        &self.queue
    }

    /// Run until `shutdown` is cancelled, then wait for in-flight attempts.
    ///
    /// Fails only if the watch stream closes underneath the controller.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let mut events = self.store.watch();
        self.enqueue_all().await;

        let workers = self.config.workers.max(1);
        let mut pool = JoinSet::new();
        for id in 0..workers {
            pool.spawn(worker(
                id,
                Arc::clone(&self.reconciler),
                Arc::clone(&self.queue),
                self.config.attempt_deadline,
            ));
        }
        info!(
            workers,
            resync_secs = self.config.resync_interval.as_secs(),
            "Controller started"
        );

        let resync_every = self.config.resync_interval.max(Duration::from_millis(1));
        let mut resync =
            tokio::time::interval_at(tokio::time::Instant::now() + resync_every, resync_every);

        let mut outcome = Ok(());
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Controller shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Watch lagged, relisting");
                        self.enqueue_all().await;
                    }
                    Err(RecvError::Closed) => {
                        error!("Watch stream closed");
                        outcome = Err(Error::Transient("watch stream closed".to_string()));
                        break;
                    }
                },
                _ = resync.tick() => {
                    debug!("Periodic resync");
                    self.enqueue_all().await;
                }
            }
        }

        self.queue.shut_down();
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker panicked");
            }
        }
        info!("Controller stopped");
        outcome
    }

    async fn handle_event(&self, event: WatchEvent) {
        match event {
            WatchEvent::InvocationChanged { key } => self.queue.add(key),
            WatchEvent::InvocationDeleted { key } => self.queue.forget(&key),
            WatchEvent::ExecutionChanged { owner, .. } | WatchEvent::ExecutionDeleted { owner, .. } => {
                if let Some(owner) = owner {
                    self.queue.add(owner);
                }
            }
            WatchEvent::BuildChanged { key } => self.enqueue_referencing(&key).await,
        }
    }

    async fn enqueue_all(&self) {
        match self.store.list_invocations().await {
            Ok(invocations) => {
                debug!(count = invocations.len(), "Enqueue all invocations");
                for invocation in invocations {
                    self.queue.add(invocation.key());
                }
            }
            // The next resync retries
            Err(e) => warn!(error = %e, "Failed to list invocations"),
        }
    }

    async fn enqueue_referencing(&self, build: &ObjectKey) {
        let invocations = match self.store.list_invocations().await {
            Ok(invocations) => invocations,
            Err(e) => {
                warn!(error = %e, build = %build, "Failed to list invocations");
                return;
            }
        };

        for invocation in invocations {
            let references = invocation
                .spec
                .reference
                .as_ref()
                .is_some_and(|r| r.name == build.name);
            if references
                && invocation.metadata.namespace == build.namespace
                && !invocation.status.is_terminal()
            {
                self.queue.add(invocation.key());
            }
        }
    }
}

async fn worker(
    id: usize,
    reconciler: Arc<Reconciler>,
    queue: Arc<WorkQueue<ObjectKey>>,
    deadline: Duration,
) {
    while let Some(key) = queue.get().await {
        let outcome = with_deadline("reconcile", deadline, reconciler.reconcile(&key)).await;

        match outcome {
            Ok(Action::Done) => queue.forget(&key),
            Ok(Action::RequeueAfter(delay)) => {
                queue.forget(&key);
                queue.add_after(key.clone(), delay);
            }
            Err(err) if err.is_retryable() => {
                let delay = queue.add_rate_limited(key.clone());
                log_retry(&key, &err, delay);
            }
            Err(err) => {
                error!(
                    namespace = %key.namespace,
                    name = %key.name,
                    error = %err,
                    "Reconcile failed permanently"
                );
                queue.forget(&key);
            }
        }

        queue.done(&key);
    }
    debug!(worker = id, "Worker stopped");
}

fn log_retry(key: &ObjectKey, err: &Error, delay: Duration) {
    let delay_ms = delay.as_millis() as u64;
    match err {
        Error::Conflict { .. } | Error::DependencyNotFound { .. } => debug!(
            namespace = %key.namespace,
            name = %key.name,
            error = %err,
            delay_ms,
            "Reconcile will be retried"
        ),
        _ => warn!(
            namespace = %key.namespace,
            name = %key.name,
            error = %err,
            delay_ms,
            "Reconcile will be retried"
        ),
    }
}

#[cfg(test)]
mod tests;
