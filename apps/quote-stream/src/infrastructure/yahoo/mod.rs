//! Push-Pricing Stream Adapters
//!
//! Client for the Yahoo Finance streamer:
//!
//! - **client**: Session driver and public control surface
//! - **transport**: WebSocket connection
//! - **codec**: Envelope and protobuf pricing decoding
//! - **heartbeat / reconnect / refresh**: Timers owned by the session

pub mod client;
pub mod clock;
pub mod codec;
pub mod heartbeat;
pub mod messages;
pub mod reconnect;
pub mod refresh;
pub mod transport;

pub use client::{ConnectionManager, StreamStatus};
pub use clock::SessionClock;
pub use codec::{DecodeError, Decoded, MessageDecoder};
pub use heartbeat::{HEARTBEAT_CHECK_INTERVAL, HeartbeatConfig, HeartbeatMonitor, HeartbeatState};
pub use messages::{Envelope, MarketHoursType, OptionType, PRICING_TYPE, PricingData, QuoteType};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use refresh::RefreshScheduler;
pub use transport::WebSocketTransport;
