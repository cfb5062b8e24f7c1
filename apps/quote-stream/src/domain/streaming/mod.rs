//! Market Data Streaming Types
//!
//! Core domain types for the quote stream: the decoded quote, the
//! connection state machine, and the event payloads emitted to consumers.
//! These types are codec-agnostic and carry no transport details.

mod events;

pub use events::{
    CloseInfo, CloseReason, ErrorInfo, ErrorKind, HeartbeatInfo, LatencyInfo, RawFrame,
    ShutdownInfo, StreamEvent, SymbolAveragesInfo, SymbolThroughputInfo, ThroughputInfo, Topic,
};

use chrono::{DateTime, Utc};
use serde::Serialize;

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of a streaming session.
///
/// ```text
/// Idle ─► Connecting ─► Open ─► Closing ─► Reconnecting ─┐
///             ▲                    │                      │
///             └────────────────────┼──────────────────────┘
///                                  └─► Terminated (reconnect disabled)
/// any ─► Terminated (manual close)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Created, `connect()` not yet called.
    #[default]
    Idle,
    /// Transport open in progress.
    Connecting,
    /// Transport open and subscriptions flushed.
    Open,
    /// Transport lost; deciding between reconnect and termination.
    Closing,
    /// Waiting out the backoff delay before the next attempt.
    Reconnecting,
    /// Terminal. No further transitions.
    Terminated,
}

impl ConnectionState {
    /// State name used in logs, metrics labels and health output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Reconnecting => "reconnecting",
            Self::Terminated => "terminated",
        }
    }

    /// Numeric code for the Prometheus state gauge.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Connecting => 1,
            Self::Open => 2,
            Self::Closing => 3,
            Self::Reconnecting => 4,
            Self::Terminated => 5,
        }
    }

    /// Whether the state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Quote Classification
// =============================================================================

/// Instrument class tag carried by each pricing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteKind {
    /// No classification supplied.
    None,
    /// Alternate symbol.
    AltSymbol,
    /// Feed heartbeat record.
    Heartbeat,
    /// Common stock.
    Equity,
    /// Market index.
    Index,
    /// Mutual fund.
    MutualFund,
    /// Money market fund.
    MoneyMarket,
    /// Listed option.
    Option,
    /// Currency pair.
    Currency,
    /// Warrant.
    Warrant,
    /// Bond.
    Bond,
    /// Futures contract.
    Future,
    /// Exchange traded fund.
    Etf,
    /// Commodity.
    Commodity,
    /// ECN quote.
    EcnQuote,
    /// Cryptocurrency.
    Cryptocurrency,
    /// Indicator.
    Indicator,
    /// Industry aggregate.
    Industry,
    /// Tag not known to this client.
    Unknown(i32),
}

impl QuoteKind {
    /// Map a wire tag to a quote kind.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::None,
            5 => Self::AltSymbol,
            7 => Self::Heartbeat,
            8 => Self::Equity,
            9 => Self::Index,
            11 => Self::MutualFund,
            12 => Self::MoneyMarket,
            13 => Self::Option,
            14 => Self::Currency,
            15 => Self::Warrant,
            17 => Self::Bond,
            18 => Self::Future,
            20 => Self::Etf,
            23 => Self::Commodity,
            28 => Self::EcnQuote,
            41 => Self::Cryptocurrency,
            42 => Self::Indicator,
            1000 => Self::Industry,
            other => Self::Unknown(other),
        }
    }
}

/// Trading session the quote was produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketHours {
    /// Pre-market session.
    PreMarket,
    /// Regular session.
    RegularMarket,
    /// Post-market session.
    PostMarket,
    /// Extended hours.
    ExtendedHoursMarket,
    /// Market closed.
    Closed,
    /// Tag not known to this client.
    Unknown(i32),
}

impl MarketHours {
    /// Map a wire tag to a market session.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::PreMarket,
            1 => Self::RegularMarket,
            2 => Self::PostMarket,
            3 => Self::ExtendedHoursMarket,
            4 => Self::Closed,
            other => Self::Unknown(other),
        }
    }
}

// =============================================================================
// Quote
// =============================================================================

/// One decoded price update for an instrument.
///
/// Immutable once built. Consumed by the metrics engine and emitted on the
/// `pricing` topic, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Instrument identifier.
    pub symbol: String,
    /// Last price.
    pub price: f64,
    /// Feed-asserted event time.
    pub event_time: DateTime<Utc>,
    /// Local receipt time.
    pub received_at: DateTime<Utc>,
    /// Instrument class.
    pub kind: QuoteKind,
    /// Trading session.
    pub market_hours: MarketHours,
    /// Listing exchange, when supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    /// Quote currency, when supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Percent change on the day, when supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    /// Session volume, when supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_volume: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_kind_known_codes() {
        assert_eq!(QuoteKind::from_code(8), QuoteKind::Equity);
        assert_eq!(QuoteKind::from_code(20), QuoteKind::Etf);
        assert_eq!(QuoteKind::from_code(41), QuoteKind::Cryptocurrency);
        assert_eq!(QuoteKind::from_code(1000), QuoteKind::Industry);
    }

    #[test]
    fn quote_kind_unknown_code_is_preserved() {
        assert_eq!(QuoteKind::from_code(99), QuoteKind::Unknown(99));
    }

    #[test]
    fn market_hours_codes() {
        assert_eq!(MarketHours::from_code(1), MarketHours::RegularMarket);
        assert_eq!(MarketHours::from_code(4), MarketHours::Closed);
        assert_eq!(MarketHours::from_code(-1), MarketHours::Unknown(-1));
    }

    #[test]
    fn connection_state_names() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
        assert_eq!(ConnectionState::Reconnecting.as_str(), "reconnecting");
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert!(ConnectionState::Terminated.is_terminal());
        assert!(!ConnectionState::Closing.is_terminal());
    }

    #[test]
    fn quote_serializes_camel_case() {
        let quote = Quote {
            symbol: "AAPL".to_string(),
            price: 189.5,
            event_time: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            received_at: DateTime::from_timestamp_millis(1_700_000_000_250).unwrap(),
            kind: QuoteKind::Equity,
            market_hours: MarketHours::RegularMarket,
            exchange: None,
            currency: Some("USD".to_string()),
            change_percent: None,
            day_volume: None,
        };

        let json = serde_json::to_value(&quote).unwrap();
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["kind"], "EQUITY");
        assert_eq!(json["marketHours"], "REGULAR_MARKET");
        assert!(json.get("eventTime").is_some());
        assert!(json.get("receivedAt").is_some());
        assert!(json.get("exchange").is_none());
        assert_eq!(json["currency"], "USD");
    }
}
