//! Stream Events
//!
//! Named events emitted by a streaming session and their payload shapes.
//! Payloads serialize to camelCase JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Quote;

// =============================================================================
// Topics
// =============================================================================

/// Named topic an event is published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Transport opened and subscriptions flushed.
    Open,
    /// Every inbound data frame, decoded or not.
    Message,
    /// Decoded quote.
    Pricing,
    /// Global throughput report.
    Throughput,
    /// Per-symbol throughput report.
    SymbolThroughput,
    /// Per-symbol moving averages.
    SymbolAverages,
    /// Feed-to-receipt latency sample.
    Latency,
    /// Liveness check result.
    Heartbeat,
    /// Transport closed.
    Close,
    /// Transport-level error.
    Error,
    /// Session terminated by `close()`.
    Shutdown,
}

impl Topic {
    /// Every topic, in emission-order documentation order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Open,
            Self::Message,
            Self::Pricing,
            Self::Throughput,
            Self::SymbolThroughput,
            Self::SymbolAverages,
            Self::Latency,
            Self::Heartbeat,
            Self::Close,
            Self::Error,
            Self::Shutdown,
        ]
    }

    /// Topic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Message => "message",
            Self::Pricing => "pricing",
            Self::Throughput => "throughput",
            Self::SymbolThroughput => "symbol-throughput",
            Self::SymbolAverages => "symbol-averages",
            Self::Latency => "latency",
            Self::Heartbeat => "heartbeat",
            Self::Close => "close",
            Self::Error => "error",
            Self::Shutdown => "shutdown",
        }
    }

    /// Look a topic up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.as_str() == name)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Raw inbound data frame as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl RawFrame {
    /// Frame size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether the frame carries no payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Global throughput over the last reporting interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThroughputInfo {
    /// Frames observed in the window.
    pub count: usize,
    /// Reporting interval length in minutes.
    pub interval_minutes: f64,
    /// Report time.
    pub timestamp: DateTime<Utc>,
}

/// Per-symbol throughput over the last reporting interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolThroughputInfo {
    /// Quotes observed per symbol in the window.
    pub per_symbol_count: BTreeMap<String, usize>,
    /// Reporting interval length in minutes.
    pub interval_minutes: f64,
    /// Report time.
    pub timestamp: DateTime<Utc>,
}

/// Per-symbol moving average of per-interval counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolAveragesInfo {
    /// Mean of the most recent per-interval counts per symbol.
    pub per_symbol_average: BTreeMap<String, f64>,
    /// Maximum number of intervals averaged.
    pub window_size: usize,
    /// Report time.
    pub timestamp: DateTime<Utc>,
}

/// Point latency measurement for one quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyInfo {
    /// Instrument identifier.
    pub symbol: String,
    /// `received_at - event_time`; negative under clock skew.
    pub latency_ms: i64,
    /// Feed-asserted event time.
    pub event_time: DateTime<Utc>,
    /// Local receipt time.
    pub received_at: DateTime<Utc>,
}

/// Result of one liveness check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatInfo {
    /// Whether data arrived within the threshold.
    pub alive: bool,
    /// Threshold in seconds.
    pub threshold_seconds: u64,
    /// Seconds since the last inbound data frame.
    pub age_seconds: f64,
    /// Time of the last inbound data frame.
    pub last_message_time: DateTime<Utc>,
    /// Time of this check.
    pub checked_at: DateTime<Utc>,
}

/// Why a transport connection ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum CloseReason {
    /// Peer sent a close frame.
    RemoteClosed(Option<String>),
    /// Inbound stream ended without a close frame.
    StreamEnded,
    /// Read or write failed.
    TransportFailure(String),
    /// The open attempt itself failed.
    ConnectFailed(String),
    /// `force_reconnect()` dropped the connection.
    Forced,
}

/// Payload of the `close` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseInfo {
    /// Why the connection ended.
    pub reason: CloseReason,
    /// Whether a reconnect is scheduled.
    pub will_reconnect: bool,
    /// Reconnect attempt number, when scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds, when scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    /// Close time.
    pub timestamp: DateTime<Utc>,
}

/// Error class carried by the `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection-level failure.
    Transport,
    /// The session driver could not start or exited abnormally.
    Runtime,
}

/// Payload of the `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// Error class.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Error time.
    pub timestamp: DateTime<Utc>,
}

/// Payload of the terminal `shutdown` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownInfo {
    /// Session identifier.
    pub session_id: String,
    /// State the session was in when `close()` was called.
    pub previous_state: super::ConnectionState,
    /// Shutdown time.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Stream Event
// =============================================================================

/// An event published by a streaming session.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Transport opened.
    Open,
    /// Raw inbound data frame.
    Message(RawFrame),
    /// Decoded quote.
    Pricing(Quote),
    /// Global throughput report.
    Throughput(ThroughputInfo),
    /// Per-symbol throughput report.
    SymbolThroughput(SymbolThroughputInfo),
    /// Per-symbol moving averages.
    SymbolAverages(SymbolAveragesInfo),
    /// Latency sample.
    Latency(LatencyInfo),
    /// Liveness check.
    Heartbeat(HeartbeatInfo),
    /// Transport closed.
    Close(CloseInfo),
    /// Transport error.
    Error(ErrorInfo),
    /// Session terminated.
    Shutdown(ShutdownInfo),
}

impl StreamEvent {
    /// Topic this event is published under.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::Open => Topic::Open,
            Self::Message(_) => Topic::Message,
            Self::Pricing(_) => Topic::Pricing,
            Self::Throughput(_) => Topic::Throughput,
            Self::SymbolThroughput(_) => Topic::SymbolThroughput,
            Self::SymbolAverages(_) => Topic::SymbolAverages,
            Self::Latency(_) => Topic::Latency,
            Self::Heartbeat(_) => Topic::Heartbeat,
            Self::Close(_) => Topic::Close,
            Self::Error(_) => Topic::Error,
            Self::Shutdown(_) => Topic::Shutdown,
        }
    }
}
