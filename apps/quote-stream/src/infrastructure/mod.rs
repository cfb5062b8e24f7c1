//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Push-pricing WebSocket client (Yahoo Finance streamer).
pub mod yahoo;

/// Broadcast channel adapters for event distribution.
pub mod broadcast;

/// Configuration loading and validation.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
