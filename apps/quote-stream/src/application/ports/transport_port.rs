//! Transport Port (Driven Port)
//!
//! Interface for opening a frame-oriented connection to the pricing feed.
//! A connection is a sink of outbound text commands and a stream of inbound
//! frames; dropping both halves releases the underlying socket.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};

/// Transport-level error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("Connection failed: {message}")]
    ConnectFailed {
        /// Underlying cause.
        message: String,
    },

    /// Writing an outbound frame failed.
    #[error("Send failed: {message}")]
    SendFailed {
        /// Underlying cause.
        message: String,
    },

    /// Reading an inbound frame failed.
    #[error("Receive failed: {message}")]
    ReceiveFailed {
        /// Underlying cause.
        message: String,
    },

    /// The connection is already closed.
    #[error("Connection closed")]
    Closed,
}

/// One frame read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// UTF-8 text data.
    Text(String),
    /// Binary data.
    Binary(Vec<u8>),
    /// Keepalive ping.
    Ping,
    /// Keepalive pong.
    Pong,
    /// Peer close, with its reason if given.
    Close(Option<String>),
}

/// Outbound half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<InboundFrame, TransportError>> + Send>>;

/// An open connection.
pub struct Connection {
    /// Outbound text commands.
    pub sink: FrameSink,
    /// Inbound frames. Ends when the peer goes away.
    pub stream: FrameStream,
}

impl Connection {
    /// Bundle the two halves of a connection.
    #[must_use]
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Port for opening feed connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectFailed` if the handshake fails.
    async fn open(&self, url: &str) -> Result<Connection, TransportError>;
}
