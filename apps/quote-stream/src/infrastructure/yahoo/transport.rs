//! WebSocket Transport
//!
//! `Transport` implementation over `tokio-tungstenite`. The socket is split
//! into a text command sink and a frame stream; protocol pings are answered
//! by tungstenite while the stream is being read.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::application::ports::{Connection, InboundFrame, Transport, TransportError};

/// WebSocket client transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create a transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &str) -> Result<Connection, TransportError> {
        let (ws_stream, response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| TransportError::ConnectFailed {
                    message: e.to_string(),
                })?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| TransportError::SendFailed {
                message: e.to_string(),
            })
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text.into()))));

        let stream = read.filter_map(|item| future::ready(convert(item)));

        Ok(Connection::new(Box::pin(sink), Box::pin(stream)))
    }
}

/// Map a tungstenite read result onto an inbound frame.
///
/// Raw frames never surface from a client read and are skipped.
fn convert(item: Result<Message, tungstenite::Error>) -> Option<Result<InboundFrame, TransportError>> {
    match item {
        Ok(Message::Text(text)) => Some(Ok(InboundFrame::Text(text.to_string()))),
        Ok(Message::Binary(bytes)) => Some(Ok(InboundFrame::Binary(bytes.to_vec()))),
        Ok(Message::Ping(_)) => Some(Ok(InboundFrame::Ping)),
        Ok(Message::Pong(_)) => Some(Ok(InboundFrame::Pong)),
        Ok(Message::Close(frame)) => Some(Ok(InboundFrame::Close(
            frame.map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str())),
        ))),
        Ok(Message::Frame(_)) => None,
        Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
            Some(Err(TransportError::Closed))
        }
        Err(e) => Some(Err(TransportError::ReceiveFailed {
            message: e.to_string(),
        })),
    }
}
