//! Configuration Module
//!
//! Stream and service configuration loaded from the environment.

mod settings;

pub use settings::{
    ConfigError, DEFAULT_STREAM_URL, FeatureFlags, MAX_INTERVAL_MINUTES, ServiceConfig,
    StreamConfig,
};
