//! Domain Layer - Core streaming types and business logic.
//!
//! This layer contains the quote, connection state and event types, the
//! symbol registry and the metrics bookkeeping. Nothing here performs I/O
//! or reads a clock; callers pass `now` in.

/// Quotes, connection states and event payloads.
pub mod streaming;

/// Symbol registry and subscription commands.
pub mod subscription;

/// Throughput windows, moving averages and latency sampling.
pub mod metrics;
