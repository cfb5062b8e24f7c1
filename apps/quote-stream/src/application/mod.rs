//! Application Layer - Port definitions.
//!
//! The interfaces the streaming session depends on: the transport it reads
//! frames from and the sink it publishes events to.

/// Port interfaces for the transport and event delivery.
pub mod ports;
