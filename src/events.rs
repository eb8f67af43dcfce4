//! Named events fanned out to live subscribers.
//!
//! Publishing is fire-and-forget with at-most-once delivery: a slow or
//! absent subscriber never fails or slows the ingestion path. The
//! production implementation rides a `tokio::sync::broadcast` channel that
//! the `/live` WebSocket route subscribes to.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{AttributeValue, Attributes};

// ---

/// Outbound event union, serialized with its name under the `event` tag.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    // ---
    /// Emitted once per accepted reading, whether or not anything fired.
    NewReading {
        identifier: String,
        attributes: Attributes,
        timestamp: DateTime<Utc>,
    },
    /// Emitted once per matched `(attribute, rule)` pair.
    Alert {
        sensor_id: String,
        attribute: String,
        value: AttributeValue,
        condition: String,
        threshold: String,
        alarm_type: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Emitted at most once per reading, carrying every flagged attribute.
    Anomaly {
        identifier: String,
        anomalies: Attributes,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        // ---
        match self {
            Self::NewReading { .. } => "new_reading",
            Self::Alert { .. } => "alert",
            Self::Anomaly { .. } => "anomaly",
        }
    }
}

// ---

/// Publishing seam between the pipeline and the subscriber transport.
pub trait EventPublisher: Send + Sync {
    /// Emit one event. Must not block and must not fail the caller.
    fn emit(&self, event: Event);
}

/// Broadcast-channel publisher backing the `/live` WebSocket stream.
pub struct BroadcastPublisher {
    // ---
    tx: broadcast::Sender<Event>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        // ---
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// New subscription; events published before this call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn emit(&self, event: Event) {
        // ---
        // send() errors only when no receiver is connected, which is the
        // normal idle state for a fire-and-forget publisher.
        let name = event.name();
        if self.tx.send(event).is_err() {
            tracing::trace!(event = name, "no live subscribers, event dropped");
        }
    }
}
