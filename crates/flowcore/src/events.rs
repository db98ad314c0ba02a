use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Changes published by a document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    WorkflowLoaded {
        workflow_id: String,
        timestamp: DateTime<Utc>,
    },
    WorkflowUpdated {
        workflow_id: String,
        timestamp: DateTime<Utc>,
    },
    NodeAdded {
        node_id: String,
        timestamp: DateTime<Utc>,
    },
    NodeUpdated {
        node_id: String,
        timestamp: DateTime<Utc>,
    },
    NodeDeleted {
        node_id: String,
        timestamp: DateTime<Utc>,
    },
    EdgeAdded {
        edge_id: String,
        timestamp: DateTime<Utc>,
    },
    EdgeUpdated {
        edge_id: String,
        timestamp: DateTime<Utc>,
    },
    EdgeDeleted {
        edge_id: String,
        timestamp: DateTime<Utc>,
    },
    VariableChanged {
        variable_id: String,
        change: Change,
        timestamp: DateTime<Utc>,
    },
    ExpressionChanged {
        expression_id: String,
        change: Change,
        timestamp: DateTime<Utc>,
    },
    SelectionChanged {
        node_id: Option<String>,
        edge_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Reset {
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    Added,
    Updated,
    Deleted,
}

/// Fan-out channel for store events.
///
/// Emitting with no subscribers is not an error; lagging subscribers lose
/// the oldest events.
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: StoreEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(StoreEvent::Reset {
            timestamp: Utc::now(),
        });

        assert!(matches!(rx.try_recv(), Ok(StoreEvent::Reset { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new(8);
        bus.emit(StoreEvent::Reset {
            timestamp: Utc::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
