//! Event Sink Port (Driven Port)
//!
//! Interface for delivering session events to consumers.

use parking_lot::Mutex;

use crate::domain::streaming::{StreamEvent, Topic};

/// Port for publishing session events.
///
/// Called from the session driver task. Implementations must not block.
pub trait EventSink: Send + Sync {
    /// Publish one event.
    fn publish(&self, event: StreamEvent);
}

/// Event sink that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn publish(&self, _event: StreamEvent) {}
}

/// In-memory event sink that keeps every published event in order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<StreamEvent>>,
}

impl RecordingEventSink {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().clone()
    }

    /// Topics of all recorded events, in publish order.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        self.events.lock().iter().map(StreamEvent::topic).collect()
    }

    /// Number of recorded events on a topic.
    #[must_use]
    pub fn count(&self, topic: Topic) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.topic() == topic)
            .count()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: StreamEvent) {
        self.events.lock().push(event);
    }
}
