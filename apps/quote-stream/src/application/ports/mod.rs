//! Port Interfaces
//!
//! Defines the interfaces (ports) the streaming session depends on. These
//! are the contracts that infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Transport`: Opens a bidirectional frame connection to the feed
//! - `EventSink`: Receives every event the session publishes

mod event_sink_port;
mod transport_port;

pub use event_sink_port::{EventSink, NoOpEventSink, RecordingEventSink};
pub use transport_port::{
    Connection, FrameSink, FrameStream, InboundFrame, Transport, TransportError,
};

#[cfg(test)]
pub use transport_port::MockTransport;
