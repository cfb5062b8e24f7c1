//! Prometheus Metrics Module
//!
//! Exposes stream metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Inbound frames, decoded quotes and decode failures
//! - **Connection**: Session state, reconnect attempts and transport errors
//! - **Liveness**: Heartbeat verdict
//! - **Subscriptions**: Subscribed symbol count and commands sent
//! - **Latency**: Feed-to-receipt latency of quotes
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! without an installed recorder is a no-op, so the client can be embedded
//! without Prometheus.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::streaming::ConnectionState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Frame counters
    describe_counter!(
        "quote_stream_frames_received_total",
        "Total data frames received from the feed"
    );
    describe_counter!(
        "quote_stream_quotes_total",
        "Total pricing records decoded"
    );
    describe_counter!(
        "quote_stream_decode_errors_total",
        "Total frames dropped because they failed to decode"
    );

    // Connection
    describe_gauge!(
        "quote_stream_connection_state",
        "Session state (0 idle, 1 connecting, 2 open, 3 closing, 4 reconnecting, 5 terminated)"
    );
    describe_counter!(
        "quote_stream_transport_errors_total",
        "Total transport errors"
    );
    describe_counter!(
        "quote_stream_reconnects_total",
        "Total scheduled reconnection attempts"
    );

    // Liveness
    describe_gauge!(
        "quote_stream_heartbeat_alive",
        "1 when data arrived within the heartbeat threshold"
    );

    // Subscriptions
    describe_gauge!(
        "quote_stream_subscribed_symbols",
        "Number of subscribed symbols"
    );
    describe_counter!(
        "quote_stream_commands_sent_total",
        "Total subscription commands written to the feed"
    );

    // Latency
    describe_histogram!(
        "quote_stream_quote_latency_seconds",
        "Feed event time to local receipt"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for inbound frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Text frame.
    Text,
    /// Binary frame.
    Binary,
}

impl FrameType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

/// Record a data frame received from the feed.
pub fn record_frame_received(frame_type: FrameType) {
    counter!(
        "quote_stream_frames_received_total",
        "frame_type" => frame_type.as_str()
    )
    .increment(1);
}

/// Record a decoded quote.
pub fn record_quote() {
    counter!("quote_stream_quotes_total").increment(1);
}

/// Record a frame that failed to decode.
pub fn record_decode_error(error_type: &'static str) {
    counter!(
        "quote_stream_decode_errors_total",
        "error_type" => error_type
    )
    .increment(1);
}

/// Update the session state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("quote_stream_connection_state").set(f64::from(state.code()));
}

/// Record a transport error.
pub fn record_transport_error() {
    counter!("quote_stream_transport_errors_total").increment(1);
}

/// Record a scheduled reconnection attempt.
pub fn record_reconnect() {
    counter!("quote_stream_reconnects_total").increment(1);
}

/// Update the heartbeat gauge.
pub fn set_heartbeat_alive(alive: bool) {
    gauge!("quote_stream_heartbeat_alive").set(if alive { 1.0 } else { 0.0 });
}

/// Update the subscribed symbol gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribed_symbols(count: usize) {
    gauge!("quote_stream_subscribed_symbols").set(count as f64);
}

/// Record a subscription command written to the feed.
pub fn record_command_sent(command: &'static str) {
    counter!(
        "quote_stream_commands_sent_total",
        "command" => command
    )
    .increment(1);
}

/// Record quote latency in milliseconds.
#[allow(clippy::cast_precision_loss)]
pub fn record_quote_latency(latency_ms: i64) {
    histogram!("quote_stream_quote_latency_seconds").record(latency_ms as f64 / 1000.0);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_type_as_str() {
        assert_eq!(FrameType::Text.as_str(), "text");
        assert_eq!(FrameType::Binary.as_str(), "binary");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_frame_received(FrameType::Text);
        record_decode_error("envelope");
        set_connection_state(ConnectionState::Open);
        set_heartbeat_alive(false);
        record_quote_latency(-5);
    }
}
