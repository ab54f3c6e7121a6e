//! Event system for ledger operations
//!
//! Services emit events after successful writes (and on rejected status
//! changes) so listeners can log or react without sitting on the write path.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::ledger::LedgerStatus;

/// Ledger events emitted by services
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    // Collection events
    CollectionCreated {
        id: String,
        farmer_id: String,
        collector_id: String,
    },
    CollectionStatusChanged {
        id: String,
        status: LedgerStatus,
        version: i64,
        changed_by: String,
    },
    CollectionConflict {
        id: String,
        expected_version: i64,
        current_version: i64,
    },
    CollectionDeleted {
        id: String,
    },

    // Actor events
    ActorRegistered {
        id: String,
        role: &'static str,
    },

    // Transaction events
    TransactionCreated {
        id: String,
    },
    TransactionStatusChanged {
        id: String,
        status: LedgerStatus,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &LedgerEvent);
}

/// Event bus for broadcasting ledger events
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: LedgerEvent) {
        trace!(event = ?event, "Emitting ledger event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::CollectionCreated { id, farmer_id, collector_id } => {
                info!(
                    id = %id,
                    farmer = %farmer_id,
                    collector = %collector_id,
                    "Collection created"
                );
            }
            LedgerEvent::CollectionStatusChanged { id, status, version, changed_by } => {
                info!(
                    id = %id,
                    status = %status,
                    version,
                    by = %changed_by,
                    "Collection status changed"
                );
            }
            LedgerEvent::CollectionConflict { id, expected_version, current_version } => {
                info!(id = %id, expected_version, current_version, "Collection write conflict");
            }
            LedgerEvent::CollectionDeleted { id } => {
                debug!(id = %id, "Collection deleted");
            }
            _ => {
                trace!(event = ?event, "Ledger event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(LedgerEvent::CollectionStatusChanged {
            id: "R1".into(),
            status: LedgerStatus::Verified,
            version: 2,
            changed_by: "collector:C1".into(),
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        match event {
            LedgerEvent::CollectionStatusChanged { id, version, .. } => {
                assert_eq!(id, "R1");
                assert_eq!(version, 2);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(LedgerEvent::CollectionDeleted { id: "R1".into() });
    }
}
