//! Yahoo Streamer Wire Types
//!
//! Wire format types for the Yahoo Finance push-pricing streamer.
//!
//! # Frame Layout
//!
//! Every inbound data frame is a UTF-8 JSON envelope:
//!
//! ```json
//! {"type":"pricing","message":"<base64 PricingData>"}
//! ```
//!
//! The `message` field of a pricing envelope is a base64-encoded
//! `PricingData` protobuf record. Envelopes of any other `type` carry no
//! pricing payload.
//!
//! Outbound commands are plain JSON objects, see
//! [`SubscriptionCommand`](crate::domain::subscription::SubscriptionCommand).

use serde::{Deserialize, Serialize};

/// Envelope `type` of pricing frames.
pub const PRICING_TYPE: &str = "pricing";

// =============================================================================
// Envelope
// =============================================================================

/// JSON envelope wrapping every inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Payload kind (`pricing` for quotes).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Base64 payload.
    #[serde(default)]
    pub message: Option<String>,
}

impl Envelope {
    /// Build a pricing envelope around an already-encoded payload.
    #[must_use]
    pub fn pricing(message: impl Into<String>) -> Self {
        Self {
            kind: Some(PRICING_TYPE.to_string()),
            message: Some(message.into()),
        }
    }

    /// Whether the envelope carries a pricing payload.
    #[must_use]
    pub fn is_pricing(&self) -> bool {
        self.kind.as_deref() == Some(PRICING_TYPE)
    }
}

// =============================================================================
// PricingData
// =============================================================================

/// Instrument class tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum QuoteType {
    /// No classification.
    None = 0,
    /// Alternate symbol.
    AltSymbol = 5,
    /// Feed heartbeat.
    Heartbeat = 7,
    /// Common stock.
    Equity = 8,
    /// Index.
    Index = 9,
    /// Mutual fund.
    MutualFund = 11,
    /// Money market fund.
    MoneyMarket = 12,
    /// Option.
    Option = 13,
    /// Currency pair.
    Currency = 14,
    /// Warrant.
    Warrant = 15,
    /// Bond.
    Bond = 17,
    /// Future.
    Future = 18,
    /// ETF.
    Etf = 20,
    /// Commodity.
    Commodity = 23,
    /// ECN quote.
    EcnQuote = 28,
    /// Cryptocurrency.
    Cryptocurrency = 41,
    /// Indicator.
    Indicator = 42,
    /// Industry.
    Industry = 1000,
}

/// Trading session tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MarketHoursType {
    /// Pre-market.
    PreMarket = 0,
    /// Regular session.
    RegularMarket = 1,
    /// Post-market.
    PostMarket = 2,
    /// Extended hours.
    ExtendedHoursMarket = 3,
    /// Closed.
    Closed = 4,
}

/// Option right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum OptionType {
    /// Call.
    Call = 0,
    /// Put.
    Put = 1,
}

/// One pricing record as published by the streamer.
///
/// proto3 omits default values on the wire, so a zero or empty field is
/// indistinguishable from an absent one.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PricingData {
    /// Instrument identifier.
    #[prost(string, tag = "1")]
    pub id: String,
    /// Last price.
    #[prost(float, tag = "2")]
    pub price: f32,
    /// Event time, milliseconds since the Unix epoch.
    #[prost(sint64, tag = "3")]
    pub time: i64,
    /// Quote currency.
    #[prost(string, tag = "4")]
    pub currency: String,
    /// Listing exchange.
    #[prost(string, tag = "5")]
    pub exchange: String,
    /// Instrument class.
    #[prost(enumeration = "QuoteType", tag = "6")]
    pub quote_type: i32,
    /// Trading session.
    #[prost(enumeration = "MarketHoursType", tag = "7")]
    pub market_hours: i32,
    /// Percent change on the day.
    #[prost(float, tag = "8")]
    pub change_percent: f32,
    /// Session volume.
    #[prost(sint64, tag = "9")]
    pub day_volume: i64,
    /// Session high.
    #[prost(float, tag = "10")]
    pub day_high: f32,
    /// Session low.
    #[prost(float, tag = "11")]
    pub day_low: f32,
    /// Absolute change on the day.
    #[prost(float, tag = "12")]
    pub change: f32,
    /// Display name.
    #[prost(string, tag = "13")]
    pub short_name: String,
    /// Expiry, for derivatives.
    #[prost(sint64, tag = "14")]
    pub expire_date: i64,
    /// Session open.
    #[prost(float, tag = "15")]
    pub open_price: f32,
    /// Previous session close.
    #[prost(float, tag = "16")]
    pub previous_close: f32,
    /// Option strike.
    #[prost(float, tag = "17")]
    pub strike_price: f32,
    /// Option underlying.
    #[prost(string, tag = "18")]
    pub underlying_symbol: String,
    /// Option open interest.
    #[prost(sint64, tag = "19")]
    pub open_interest: i64,
    /// Option right.
    #[prost(enumeration = "OptionType", tag = "20")]
    pub options_type: i32,
    /// Mini option flag.
    #[prost(sint64, tag = "21")]
    pub mini_option: i64,
    /// Last trade size.
    #[prost(sint64, tag = "22")]
    pub last_size: i64,
    /// Best bid.
    #[prost(float, tag = "23")]
    pub bid: f32,
    /// Best bid size.
    #[prost(sint64, tag = "24")]
    pub bid_size: i64,
    /// Best ask.
    #[prost(float, tag = "25")]
    pub ask: f32,
    /// Best ask size.
    #[prost(sint64, tag = "26")]
    pub ask_size: i64,
    /// Display precision hint.
    #[prost(sint64, tag = "27")]
    pub price_hint: i64,
}
