//! Broadcast Channel Adapters
//!
//! Implements event distribution using a tokio broadcast channel for
//! fan-out to multiple listeners.
//!
//! # Architecture
//!
//! `EventBus` is the provided `EventSink`. Every session event goes through
//! one channel; each `EventReceiver` filters it down to the topics it asked
//! for. Slow receivers lag and skip rather than back-pressuring the session.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::application::ports::EventSink;
use crate::domain::streaming::{StreamEvent, Topic};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Events buffered per receiver before it starts lagging.
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { capacity: 4096 }
    }
}

// =============================================================================
// Event Bus
// =============================================================================

/// Topic-addressed publish/subscribe over a broadcast channel.
///
/// # Example
///
/// ```rust
/// use quote_stream::application::ports::EventSink;
/// use quote_stream::domain::streaming::{StreamEvent, Topic};
/// use quote_stream::infrastructure::broadcast::EventBus;
///
/// # async fn example() {
/// let bus = EventBus::with_defaults();
/// let mut opens = bus.subscribe_topics([Topic::Open]);
///
/// bus.publish(StreamEvent::Open);
/// assert!(matches!(opens.recv().await, Ok(StreamEvent::Open)));
/// # }
/// ```
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<StreamEvent>,
}

impl EventBus {
    /// Create a new event bus with the given configuration.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            tx: broadcast::channel(config.capacity.max(1)).0,
        }
    }

    /// Create a new event bus with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BroadcastConfig::default())
    }

    /// Receive every event.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
            topics: None,
        }
    }

    /// Receive only events on `topics`.
    #[must_use]
    pub fn subscribe_topics(&self, topics: impl IntoIterator<Item = Topic>) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
            topics: Some(topics.into_iter().collect()),
        }
    }

    /// Get the number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get statistics about the bus.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            receivers: self.tx.receiver_count(),
            buffered: self.tx.len(),
        }
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: StreamEvent) {
        let topic = event.topic();
        if self.tx.send(event).is_err() {
            tracing::trace!(topic = %topic, "No listeners for event");
        }
    }
}

/// Shared event bus reference.
pub type SharedEventBus = Arc<EventBus>;

/// Statistics about the event bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Number of receivers.
    pub receivers: usize,
    /// Events not yet seen by the slowest receiver.
    pub buffered: usize,
}

// =============================================================================
// Receiver
// =============================================================================

/// Receiving end of an `EventBus` subscription.
#[derive(Debug)]
pub struct EventReceiver {
    rx: broadcast::Receiver<StreamEvent>,
    topics: Option<BTreeSet<Topic>>,
}

impl EventReceiver {
    /// Wait for the next matching event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged` when events were skipped; the receiver stays
    /// usable. `RecvError::Closed` once the bus is dropped.
    pub async fn recv(&mut self) -> Result<StreamEvent, RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if self.accepts(event.topic()) {
                return Ok(event);
            }
        }
    }

    /// Whether this receiver listens on `topic`.
    #[must_use]
    pub fn accepts(&self, topic: Topic) -> bool {
        self.topics.as_ref().is_none_or(|topics| topics.contains(&topic))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::streaming::{ErrorInfo, ErrorKind};

    fn error_event() -> StreamEvent {
        StreamEvent::Error(ErrorInfo {
            kind: ErrorKind::Transport,
            message: "reset".to_string(),
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn bus_creation() {
        let bus = EventBus::with_defaults();
        assert_eq!(bus.receiver_count(), 0);
        assert_eq!(bus.stats(), BroadcastStats::default());
    }

    #[test]
    fn receiver_count_decreases_on_drop() {
        let bus = EventBus::with_defaults();

        {
            let _rx1 = bus.subscribe();
            let _rx2 = bus.subscribe_topics([Topic::Open]);
            assert_eq!(bus.receiver_count(), 2);
        }

        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn publish_with_no_receivers_is_silent() {
        let bus = EventBus::with_defaults();
        bus.publish(StreamEvent::Open);
    }

    #[tokio::test]
    async fn filtered_receiver_skips_other_topics() {
        let bus = EventBus::with_defaults();
        let mut errors = bus.subscribe_topics([Topic::Error]);
        let mut all = bus.subscribe();

        bus.publish(StreamEvent::Open);
        bus.publish(error_event());

        assert!(matches!(errors.recv().await, Ok(StreamEvent::Error(_))));
        assert!(matches!(all.recv().await, Ok(StreamEvent::Open)));
        assert!(matches!(all.recv().await, Ok(StreamEvent::Error(_))));
    }

    #[test]
    fn accepts_reflects_topics() {
        let bus = EventBus::with_defaults();
        let rx = bus.subscribe_topics([Topic::Pricing, Topic::Latency]);
        assert!(rx.accepts(Topic::Pricing));
        assert!(!rx.accepts(Topic::Heartbeat));
        assert!(bus.subscribe().accepts(Topic::Heartbeat));
    }

    #[tokio::test]
    async fn slow_receiver_lags() {
        let bus = EventBus::new(BroadcastConfig { capacity: 2 });
        let mut rx = bus.subscribe();

        for _ in 0..4 {
            bus.publish(StreamEvent::Open);
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(2))));
        assert!(matches!(rx.recv().await, Ok(StreamEvent::Open)));
    }

    #[tokio::test]
    async fn closed_when_bus_dropped() {
        let bus = EventBus::with_defaults();
        let mut rx = bus.subscribe();
        drop(bus);
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }
}
