//! Board events and the broadcast EventBus
//!
//! Events are the observability and notification sink for the board: the
//! catalog reports missing asset folders here, the manager announces every
//! successful mutation, and media sync reports sweep results. Emission is
//! lossy; a board with no listeners behaves exactly like one with many.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Board event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoardEvent {
    /// A system category contributed no bundled pictures
    CatalogWarning {
        category_id: String,
        message: String,
    },

    /// Initialization fell back to system-only content
    InitializationDegraded {
        reason: String,
    },

    /// Reconciliation finished
    BoardLoaded {
        categories: usize,
        cards: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    CategoryAdded {
        category_id: String,
    },

    CategoryUpdated {
        category_id: String,
    },

    /// Category removed together with the cards it held
    CategoryDeleted {
        category_id: String,
        cards_removed: usize,
    },

    CardAdded {
        card_id: String,
        category_id: String,
    },

    CardDeleted {
        card_id: String,
        category_id: String,
    },

    /// Target category was renumbered after a move
    CardsReordered {
        card_id: String,
        source_category_id: String,
        target_category_id: String,
    },

    /// A media sync sweep completed
    MediaSyncCompleted {
        uploaded: usize,
        failed: usize,
    },
}

/// Broadcast bus for board events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BoardEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use aac_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: BoardEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit_lossy(BoardEvent::CategoryAdded {
            category_id: "hobbies-1".to_string(),
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit_lossy(BoardEvent::CardAdded {
            card_id: "c1".to_string(),
            category_id: "food".to_string(),
        });
        bus.emit_lossy(BoardEvent::CardDeleted {
            card_id: "c1".to_string(),
            category_id: "food".to_string(),
        });

        assert!(matches!(rx.recv().await.unwrap(), BoardEvent::CardAdded { .. }));
        assert!(matches!(rx.recv().await.unwrap(), BoardEvent::CardDeleted { .. }));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(BoardEvent::MediaSyncCompleted {
            uploaded: 2,
            failed: 1,
        })
        .unwrap();
        assert_eq!(json["type"], "MediaSyncCompleted");
        assert_eq!(json["uploaded"], 2);
    }
}
