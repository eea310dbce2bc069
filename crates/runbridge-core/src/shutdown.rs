//! Graceful shutdown
//!
//! Coordinates stopping the controller on Ctrl+C or SIGTERM.
//!
//! ## Usage
//!
//! ```ignore
//! let shutdown = ShutdownController::new();
//! tokio::spawn(shutdown_signal_with_controller(Arc::clone(&shutdown)));
//!
//! let guard = shutdown.register_task();
//! controller.run(shutdown.token()).await?;
//! guard.complete();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default drain timeout in seconds
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Shutdown phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Normal operation
    Running,
    /// Cancellation sent, waiting for registered tasks to finish
    Draining,
    /// Drain timeout exceeded
    Terminating,
    /// Shutdown complete
    Terminated,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Draining => write!(f, "Draining"),
            Self::Terminating => write!(f, "Terminating"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Shutdown controller for coordinating graceful shutdown
pub struct ShutdownController {
    cancel_token: CancellationToken,
    phase: AtomicU32,
    shutdown_initiated: AtomicBool,
    active_tasks: AtomicU32,
    timeout: Duration,
}

impl ShutdownController {
    /// Create a shutdown controller with the default drain timeout
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS))
    }

    /// Create a shutdown controller with a custom drain timeout
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            cancel_token: CancellationToken::new(),
            phase: AtomicU32::new(ShutdownPhase::Running as u32),
            shutdown_initiated: AtomicBool::new(false),
            active_tasks: AtomicU32::new(0),
            timeout,
        })
    }

    /// Get a cancellation token for a component
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Get current shutdown phase
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        match self.phase.load(Ordering::SeqCst) {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::Draining,
            2 => ShutdownPhase::Terminating,
            _ => ShutdownPhase::Terminated,
        }
    }

    /// Check if shutdown has been initiated
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Register a task that shutdown waits for
    pub fn register_task(&self) -> TaskGuard<'_> {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            controller: self,
            completed: false,
        }
    }

    /// Get the count of active tasks
    #[must_use]
    pub fn active_task_count(&self) -> u32 {
        self.active_tasks.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        self.phase.store(phase as u32, Ordering::SeqCst);
        info!(phase = %phase, "Shutdown phase changed");
    }

    /// Cancel every token and wait for registered tasks, up to the timeout
    pub async fn shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Shutdown already initiated");
            return;
        }

        info!("Initiating graceful shutdown...");
        self.set_phase(ShutdownPhase::Draining);
        self.cancel_token.cancel();

        let drain_start = tokio::time::Instant::now();
        let check_interval = Duration::from_millis(100);

        loop {
            let active = self.active_task_count();
            if active == 0 {
                info!("All tasks completed gracefully");
                break;
            }

            let elapsed = drain_start.elapsed();
            if elapsed >= self.timeout {
                warn!(
                    active_tasks = active,
                    timeout_secs = self.timeout.as_secs(),
                    "Shutdown timeout exceeded, giving up on remaining tasks"
                );
                self.set_phase(ShutdownPhase::Terminating);
                break;
            }

            debug!(
                active_tasks = active,
                elapsed_ms = elapsed.as_millis() as u64,
                "Waiting for tasks to complete..."
            );
            tokio::time::sleep(check_interval).await;
        }

        self.set_phase(ShutdownPhase::Terminated);
        info!("Graceful shutdown complete");
    }
}

/// Guard for a task registered with [`ShutdownController::register_task`]
///
/// Decrements the active task count when completed or dropped.
pub struct TaskGuard<'a> {
    controller: &'a ShutdownController,
    completed: bool,
}

impl TaskGuard<'_> {
    /// Mark the task as completed
    pub fn complete(mut self) {
        self.completed = true;
        self.controller.active_tasks.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.controller.active_tasks.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

/// Wait for a shutdown signal, then shut `controller` down
pub async fn shutdown_signal_with_controller(controller: Arc<ShutdownController>) {
    wait_for_shutdown_signal().await;
    controller.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_phases() {
        let controller = ShutdownController::new();
        assert_eq!(controller.phase(), ShutdownPhase::Running);
        assert!(!controller.is_shutting_down());

        controller.shutdown().await;

        assert_eq!(controller.phase(), ShutdownPhase::Terminated);
        assert!(controller.is_shutting_down());
    }

    #[tokio::test]
    async fn test_task_guard() {
        let controller = ShutdownController::new();
        assert_eq!(controller.active_task_count(), 0);

        {
            let _guard1 = controller.register_task();
            let _guard2 = controller.register_task();
            assert_eq!(controller.active_task_count(), 2);
        }

        assert_eq!(controller.active_task_count(), 0);
    }

    #[tokio::test]
    async fn test_task_guard_complete() {
        let controller = ShutdownController::new();

        let guard = controller.register_task();
        assert_eq!(controller.active_task_count(), 1);

        guard.complete();
        assert_eq!(controller.active_task_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_reaches_child_tokens() {
        let controller = ShutdownController::new();
        let token = controller.token();
        assert!(!token.is_cancelled());

        controller.shutdown().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_registered_task() {
        let controller = ShutdownController::new();
        let token = controller.token();

        let worker = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                let guard = controller.register_task();
                token.cancelled().await;
                tokio::time::sleep(Duration::from_millis(50)).await;
                guard.complete();
            })
        };
        tokio::task::yield_now().await;

        controller.shutdown().await;
        assert_eq!(controller.active_task_count(), 0);
        assert_eq!(controller.phase(), ShutdownPhase::Terminated);
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout() {
        let controller = ShutdownController::with_timeout(Duration::from_secs(1));
        let _stuck = controller.register_task();

        controller.shutdown().await;
        assert_eq!(controller.phase(), ShutdownPhase::Terminated);
        assert_eq!(controller.active_task_count(), 1);
    }

    #[tokio::test]
    async fn test_double_shutdown() {
        let controller = ShutdownController::new();

        let first = {
            let c = Arc::clone(&controller);
            tokio::spawn(async move { c.shutdown().await })
        };
        let second = {
            let c = Arc::clone(&controller);
            tokio::spawn(async move { c.shutdown().await })
        };
        let _ = tokio::join!(first, second);

        assert_eq!(controller.phase(), ShutdownPhase::Terminated);
    }
}
