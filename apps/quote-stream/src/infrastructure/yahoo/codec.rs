//! Pricing Frame Decoder
//!
//! Turns one raw inbound frame into a typed [`Quote`] or rejects it.
//!
//! Decoding is three layers deep: JSON envelope, base64 payload, protobuf
//! `PricingData`. A failure at any layer yields a [`DecodeError`]; the caller
//! drops the frame and carries on. Envelopes that are not pricing payloads
//! decode to [`Decoded::Passthrough`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use prost::Message;

use crate::domain::streaming::{MarketHours, Quote, QuoteKind, RawFrame};
use crate::infrastructure::yahoo::messages::{Envelope, PricingData};

/// Decoder errors.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not a JSON envelope.
    #[error("envelope error: {0}")]
    Envelope(#[from] serde_json::Error),

    /// The payload is not valid base64.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The payload is not a valid `PricingData` record.
    #[error("protobuf error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// A binary frame is not UTF-8.
    #[error("binary frame is not valid UTF-8")]
    InvalidUtf8,

    /// Structurally valid but semantically malformed.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl DecodeError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Envelope(_) => "envelope",
            Self::Base64(_) => "base64",
            Self::Protobuf(_) => "protobuf",
            Self::InvalidUtf8 => "utf8",
            Self::ProtocolViolation(_) => "protocol",
        }
    }
}

/// Outcome of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A pricing record.
    Pricing(Quote),
    /// A well-formed envelope with no pricing payload.
    Passthrough {
        /// Envelope `type`, if present.
        kind: Option<String>,
    },
}

/// Decoder for Yahoo streamer frames.
#[derive(Debug, Default, Clone)]
pub struct MessageDecoder;

impl MessageDecoder {
    /// Create a new decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one inbound frame received at `received_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if any layer of the frame fails to parse, or if the
    /// record lacks an identifier, carries a non-finite price or an event
    /// time outside the representable range.
    pub fn decode(
        &self,
        frame: &RawFrame,
        received_at: DateTime<Utc>,
    ) -> Result<Decoded, DecodeError> {
        let text = match frame {
            RawFrame::Text(text) => text.as_str(),
            RawFrame::Binary(bytes) => {
                std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?
            }
        };

        let envelope: Envelope = serde_json::from_str(text)?;
        if !envelope.is_pricing() {
            return Ok(Decoded::Passthrough {
                kind: envelope.kind,
            });
        }

        let payload = envelope.message.ok_or_else(|| {
            DecodeError::ProtocolViolation("pricing envelope without message".to_string())
        })?;
        let record = self.decode_payload(&payload)?;
        to_quote(record, received_at).map(Decoded::Pricing)
    }

    /// Decode a base64 `PricingData` payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not base64 or not a valid record.
    pub fn decode_payload(&self, payload: &str) -> Result<PricingData, DecodeError> {
        let bytes = STANDARD.decode(payload.trim())?;
        Ok(PricingData::decode(bytes.as_slice())?)
    }

    /// Encode a record as a pricing envelope frame.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, record: &PricingData) -> Result<String, DecodeError> {
        let envelope = Envelope::pricing(STANDARD.encode(record.encode_to_vec()));
        Ok(serde_json::to_string(&envelope)?)
    }
}

fn to_quote(record: PricingData, received_at: DateTime<Utc>) -> Result<Quote, DecodeError> {
    let symbol = record.id.trim().to_string();
    if symbol.is_empty() {
        return Err(DecodeError::ProtocolViolation(
            "pricing record without id".to_string(),
        ));
    }

    let price = f64::from(record.price);
    if !price.is_finite() {
        return Err(DecodeError::ProtocolViolation(format!(
            "non-finite price for {symbol}"
        )));
    }

    let event_time = DateTime::from_timestamp_millis(record.time).ok_or_else(|| {
        DecodeError::ProtocolViolation(format!("event time out of range for {symbol}"))
    })?;

    Ok(Quote {
        symbol,
        price,
        event_time,
        received_at,
        kind: QuoteKind::from_code(record.quote_type),
        market_hours: MarketHours::from_code(record.market_hours),
        exchange: non_empty(record.exchange),
        currency: non_empty(record.currency),
        change_percent: (record.change_percent != 0.0).then(|| f64::from(record.change_percent)),
        day_volume: (record.day_volume != 0).then_some(record.day_volume),
    })
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::yahoo::messages::{MarketHoursType, QuoteType};

    fn received() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_250).unwrap()
    }

    fn record(id: &str, price: f32) -> PricingData {
        PricingData {
            id: id.to_string(),
            price,
            time: 1_700_000_000_000,
            currency: "USD".to_string(),
            exchange: "NMS".to_string(),
            quote_type: QuoteType::Equity as i32,
            market_hours: MarketHoursType::RegularMarket as i32,
            change_percent: 1.25,
            day_volume: 42_000,
            ..PricingData::default()
        }
    }

    fn frame(record: &PricingData) -> RawFrame {
        RawFrame::Text(MessageDecoder::new().encode(record).unwrap())
    }

    #[test]
    fn decodes_pricing_text_frame() {
        let decoded = MessageDecoder::new()
            .decode(&frame(&record("AAPL", 189.5)), received())
            .unwrap();

        let Decoded::Pricing(quote) = decoded else {
            panic!("expected pricing");
        };
        assert_eq!(quote.symbol, "AAPL");
        assert!((quote.price - 189.5).abs() < f64::EPSILON);
        assert_eq!(quote.event_time.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(quote.received_at, received());
        assert_eq!(quote.kind, QuoteKind::Equity);
        assert_eq!(quote.market_hours, MarketHours::RegularMarket);
        assert_eq!(quote.exchange.as_deref(), Some("NMS"));
        assert_eq!(quote.currency.as_deref(), Some("USD"));
        assert_eq!(quote.day_volume, Some(42_000));
        assert!(quote.change_percent.is_some());
    }

    #[test]
    fn decodes_binary_frame_with_same_envelope() {
        let RawFrame::Text(text) = frame(&record("MSFT", 10.0)) else {
            unreachable!()
        };
        let decoded = MessageDecoder::new()
            .decode(&RawFrame::Binary(text.into_bytes()), received())
            .unwrap();
        assert!(matches!(decoded, Decoded::Pricing(q) if q.symbol == "MSFT"));
    }

    #[test]
    fn absent_optionals_are_none() {
        let bare = PricingData {
            id: "BTC-USD".to_string(),
            price: 1.0,
            time: 1,
            ..PricingData::default()
        };
        let Decoded::Pricing(quote) = MessageDecoder::new()
            .decode(&frame(&bare), received())
            .unwrap()
        else {
            panic!("expected pricing");
        };
        assert!(quote.exchange.is_none());
        assert!(quote.currency.is_none());
        assert!(quote.change_percent.is_none());
        assert!(quote.day_volume.is_none());
        assert_eq!(quote.kind, QuoteKind::None);
    }

    #[test]
    fn non_pricing_envelope_passes_through() {
        let decoded = MessageDecoder::new()
            .decode(&RawFrame::Text(r#"{"type":"status"}"#.to_string()), received())
            .unwrap();
        assert_eq!(
            decoded,
            Decoded::Passthrough {
                kind: Some("status".to_string())
            }
        );
    }

    #[test]
    fn rejects_non_json() {
        let err = MessageDecoder::new()
            .decode(&RawFrame::Text("not json".to_string()), received())
            .unwrap_err();
        assert!(matches!(err, DecodeError::Envelope(_)));
        assert_eq!(err.kind(), "envelope");
    }

    #[test]
    fn rejects_bad_base64() {
        let err = MessageDecoder::new()
            .decode(
                &RawFrame::Text(r#"{"type":"pricing","message":"!!!"}"#.to_string()),
                received(),
            )
            .unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn rejects_bad_protobuf() {
        // 0xFF is an invalid wire type / truncated varint.
        let payload = STANDARD.encode([0xFF_u8, 0xFF, 0xFF]);
        let text = format!(r#"{{"type":"pricing","message":"{payload}"}}"#);
        let err = MessageDecoder::new()
            .decode(&RawFrame::Text(text), received())
            .unwrap_err();
        assert!(matches!(err, DecodeError::Protobuf(_)));
    }

    #[test]
    fn rejects_missing_message() {
        let err = MessageDecoder::new()
            .decode(&RawFrame::Text(r#"{"type":"pricing"}"#.to_string()), received())
            .unwrap_err();
        assert!(matches!(err, DecodeError::ProtocolViolation(_)));
    }

    #[test]
    fn rejects_empty_id() {
        let err = MessageDecoder::new()
            .decode(&frame(&record("", 1.0)), received())
            .unwrap_err();
        assert!(matches!(err, DecodeError::ProtocolViolation(_)));
        assert_eq!(err.kind(), "protocol");
    }

    #[test]
    fn rejects_non_finite_price() {
        let err = MessageDecoder::new()
            .decode(&frame(&record("AAPL", f32::NAN)), received())
            .unwrap_err();
        assert!(matches!(err, DecodeError::ProtocolViolation(_)));
    }

    #[test]
    fn rejects_invalid_utf8_binary() {
        let err = MessageDecoder::new()
            .decode(&RawFrame::Binary(vec![0xC3, 0x28]), received())
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidUtf8));
    }
}
