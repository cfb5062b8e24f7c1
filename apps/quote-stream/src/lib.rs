#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Quote Stream - Push-Pricing Feed Client
//!
//! A long-lived client for push-pricing WebSocket feeds. It keeps one
//! connection alive through unexpected drops, replays the subscription set
//! after every reconnect, watches for silent feeds, and reports throughput,
//! per-symbol rates, moving averages and latency as events.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core streaming logic and data types
//!   - `streaming`: Quotes, connection states, event payloads
//!   - `subscription`: Symbol registry and subscription commands
//!   - `metrics`: Sliding throughput windows and moving averages
//!
//! - **Application**: Port definitions
//!   - `ports`: Transport and event sink interfaces
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `yahoo`: Session driver, WebSocket transport, frame decoding
//!   - `broadcast`: Topic-filtered event distribution
//!   - `config`: Configuration and validation
//!   - `health`: Health check HTTP endpoint
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Tracing subscriber setup
//!
//! # Data Flow
//!
//! ```text
//!                 ┌──────────────────────────────────────────┐
//! Feed WS ──────► │ ConnectionManager driver                 │
//!   ▲             │  decode ─► metrics ─► heartbeat          │ ──► EventSink ──► listeners
//!   │             │  reconnect policy · refresh scheduler    │
//!   └── commands ─┤  symbol registry                         │
//!                 └──────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::metrics::MetricsConfig;
pub use domain::streaming::{ConnectionState, Quote, StreamEvent, Topic};
pub use domain::subscription::{SubscriptionCommand, Symbol, SymbolRegistry};

// Ports
pub use application::ports::{EventSink, NoOpEventSink, RecordingEventSink, Transport};

// Client
pub use infrastructure::yahoo::{ConnectionManager, StreamStatus, WebSocketTransport};

// Infrastructure config
pub use infrastructure::config::{ConfigError, FeatureFlags, ServiceConfig, StreamConfig};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Event bus
pub use infrastructure::broadcast::{BroadcastConfig, EventBus, EventReceiver, SharedEventBus};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
