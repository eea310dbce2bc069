//! Store change notifications
//!
//! A broadcast bus of [`WatchEvent`]s. Slow subscribers lag instead of
//! blocking writers and must relist.

use runbridge_api::ObjectKey;
use serde::Serialize;
use tokio::sync::broadcast;

/// Change notification emitted by the store.
///
/// Notifications only say *which* object changed. Consumers re-read the
/// object; they never act on notification content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchEvent {
    /// Invocation created or modified
    InvocationChanged {
        /// Invocation key
        key: ObjectKey,
    },
    /// Invocation deleted
    InvocationDeleted {
        /// Invocation key
        key: ObjectKey,
    },
    /// Execution created or modified
    ExecutionChanged {
        /// Execution key
        key: ObjectKey,
        /// Owning invocation, from the controller owner reference
        owner: Option<ObjectKey>,
    },
    /// Execution deleted
    ExecutionDeleted {
        /// Execution key
        key: ObjectKey,
        /// Owning invocation
        owner: Option<ObjectKey>,
    },
    /// Build created, modified or deleted
    BuildChanged {
        /// Build key
        key: ObjectKey,
    },
}

/// Broadcast channel carrying [`WatchEvent`]s.
///
/// Slow subscribers miss events (`RecvError::Lagged`) rather than blocking
/// writers; a lagged subscriber must relist.
#[derive(Debug, Clone)]
pub struct WatchBus {
    sender: broadcast::Sender<WatchEvent>,
}

impl WatchBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers received it
    pub fn publish(&self, event: WatchEvent) -> usize {
        // No receivers is fine
        self.sender.send(event).unwrap_or(0)
    }

    /// Number of active subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for WatchBus {
    fn default() -> Self {
        Self::new(256)
    }
}
