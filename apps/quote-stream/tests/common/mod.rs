//! Shared fixtures for driving a session against an in-memory feed.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::SinkExt;
use futures::StreamExt;
use futures::channel::mpsc;
use parking_lot::Mutex;

use quote_stream::application::ports::{Connection, InboundFrame, Transport, TransportError};
use quote_stream::infrastructure::yahoo::{MarketHoursType, MessageDecoder, PricingData, QuoteType};
use quote_stream::{ConnectionManager, RecordingEventSink, StreamConfig};

pub const FEED_URL: &str = "ws://feed.test/stream";

/// 2023-11-14T22:13:20Z
pub const ORIGIN_MS: i64 = 1_700_000_000_000;

pub fn origin() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ORIGIN_MS).unwrap()
}

pub fn config() -> StreamConfig {
    StreamConfig::with_url(FEED_URL)
}

enum Step {
    Accept(Connection),
    Fail(String),
}

/// Transport that answers `open()` from a script.
///
/// Once the script is exhausted `open()` never resolves, which parks the
/// session in `Connecting`.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    opens: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a successful open and return the feed side of it.
    pub fn accept(&self) -> Feed {
        let (inbound_tx, inbound_rx) = mpsc::unbounded();
        let (outbound_tx, outbound_rx) = mpsc::unbounded::<String>();
        let sink = outbound_tx.sink_map_err(|_| TransportError::Closed);
        self.script.lock().push_back(Step::Accept(Connection::new(
            Box::pin(sink),
            Box::pin(inbound_rx),
        )));
        Feed {
            inbound: inbound_tx,
            outbound: outbound_rx,
        }
    }

    /// Queue a failed open.
    pub fn fail(&self, message: &str) {
        self.script
            .lock()
            .push_back(Step::Fail(message.to_string()));
    }

    /// Number of `open()` calls so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, url: &str) -> Result<Connection, TransportError> {
        assert_eq!(url, FEED_URL);
        self.opens.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().pop_front();
        match step {
            Some(Step::Accept(connection)) => Ok(connection),
            Some(Step::Fail(message)) => Err(TransportError::ConnectFailed { message }),
            None => std::future::pending().await,
        }
    }
}

/// Feed side of one scripted connection.
pub struct Feed {
    inbound: mpsc::UnboundedSender<Result<InboundFrame, TransportError>>,
    outbound: mpsc::UnboundedReceiver<String>,
}

impl Feed {
    pub fn send(&self, frame: InboundFrame) {
        self.inbound.unbounded_send(Ok(frame)).unwrap();
    }

    pub fn send_text(&self, text: &str) {
        self.send(InboundFrame::Text(text.to_string()));
    }

    pub fn send_quote(&self, symbol: &str, price: f32, event_time_ms: i64) {
        self.send(InboundFrame::Text(pricing_frame(symbol, price, event_time_ms)));
    }

    pub fn fail(&self, message: &str) {
        self.inbound
            .unbounded_send(Err(TransportError::ReceiveFailed {
                message: message.to_string(),
            }))
            .unwrap();
    }

    /// End the inbound stream as if the socket dropped.
    pub fn hang_up(&self) {
        self.inbound.close_channel();
    }

    /// Whether the client still holds the connection.
    pub fn is_connected(&self) -> bool {
        !self.inbound.is_closed()
    }

    /// Commands written by the client so far.
    pub fn commands(&mut self) -> Vec<String> {
        let mut commands = Vec::new();
        while let Some(Some(command)) = self.outbound.next().now_or_never() {
            commands.push(command);
        }
        commands
    }

    /// Whether the client dropped its write half.
    pub fn writer_closed(&mut self) -> bool {
        matches!(self.outbound.next().now_or_never(), Some(None))
    }
}

pub fn pricing_frame(symbol: &str, price: f32, event_time_ms: i64) -> String {
    let record = PricingData {
        id: symbol.to_string(),
        price,
        time: event_time_ms,
        currency: "USD".to_string(),
        exchange: "NMS".to_string(),
        quote_type: QuoteType::Equity as i32,
        market_hours: MarketHoursType::RegularMarket as i32,
        ..PricingData::default()
    };
    MessageDecoder::new().encode(&record).unwrap()
}

pub fn session(
    config: StreamConfig,
    transport: &Arc<ScriptedTransport>,
) -> (ConnectionManager, Arc<RecordingEventSink>) {
    let sink = Arc::new(RecordingEventSink::new());
    let manager =
        ConnectionManager::with_origin(config, transport.clone(), sink.clone(), origin()).unwrap();
    (manager, sink)
}

/// Let spawned tasks run without advancing the paused clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused clock and let the driver react.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}
