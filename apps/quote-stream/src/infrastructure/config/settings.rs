//! Stream Configuration Settings
//!
//! Configuration types for the quote stream, loaded from environment
//! variables prefixed with `QUOTE_STREAM_`. Every option has a default;
//! unparseable values fall back to it and `validate()` rejects combinations
//! that cannot work.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::metrics::MetricsConfig;
use crate::infrastructure::yahoo::heartbeat::HeartbeatConfig;
use crate::infrastructure::yahoo::reconnect::ReconnectConfig;
use crate::infrastructure::yahoo::refresh::RefreshScheduler;

/// Default push-pricing endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://streamer.finance.yahoo.com/?version=2";

const ENV_PREFIX: &str = "QUOTE_STREAM_";

/// Longest accepted report or refresh interval (one year).
pub const MAX_INTERVAL_MINUTES: f64 = 525_600.0;

/// Feature switches. All enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Reconnect after unintended closes.
    pub reconnect: bool,
    /// Periodically cycle the subscription set.
    pub auto_refresh: bool,
    /// Emit liveness checks.
    pub heartbeat: bool,
    /// Report global throughput.
    pub global_throughput: bool,
    /// Report per-symbol throughput.
    pub symbol_throughput: bool,
    /// Report per-symbol moving averages.
    pub symbol_averages: bool,
    /// Sample per-quote latency.
    pub latency: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            reconnect: true,
            auto_refresh: true,
            heartbeat: true,
            global_throughput: true,
            symbol_throughput: true,
            symbol_averages: true,
            latency: true,
        }
    }
}

/// Streaming session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Feed endpoint.
    pub url: String,
    /// Throughput window length and report cadence, in minutes.
    pub report_interval_minutes: f64,
    /// Auto-refresh cadence in minutes; `<= 0` disables.
    pub refresh_interval_minutes: f64,
    /// Maximum tolerated gap between data frames, in seconds.
    pub heartbeat_threshold_secs: u64,
    /// Delay before the first reconnect attempt.
    pub reconnect_base_delay_ms: u64,
    /// Upper bound on the reconnect delay.
    pub reconnect_max_delay_ms: u64,
    /// Symmetric jitter fraction applied to reconnect sleeps.
    pub reconnect_jitter: f64,
    /// Number of intervals in each symbol's moving average.
    pub symbol_average_window: usize,
    /// Feature switches.
    pub features: FeatureFlags,
    /// Log every metrics report at info level.
    pub verbose_metrics: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            report_interval_minutes: 1.0,
            refresh_interval_minutes: 0.0,
            heartbeat_threshold_secs: 30,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60_000,
            reconnect_jitter: 0.0,
            symbol_average_window: 5,
            features: FeatureFlags::default(),
            verbose_metrics: false,
        }
    }
}

impl StreamConfig {
    /// Default configuration pointed at another endpoint.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration fails validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let flags = FeatureFlags::default();
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let config = Self {
            url: var("URL")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.url),
            report_interval_minutes: parse_env(
                var("REPORT_INTERVAL_MINUTES"),
                defaults.report_interval_minutes,
            ),
            refresh_interval_minutes: parse_env(
                var("REFRESH_INTERVAL_MINUTES"),
                defaults.refresh_interval_minutes,
            ),
            heartbeat_threshold_secs: parse_env(
                var("HEARTBEAT_THRESHOLD_SECS"),
                defaults.heartbeat_threshold_secs,
            ),
            reconnect_base_delay_ms: parse_env(
                var("RECONNECT_BASE_DELAY_MS"),
                defaults.reconnect_base_delay_ms,
            ),
            reconnect_max_delay_ms: parse_env(
                var("RECONNECT_MAX_DELAY_MS"),
                defaults.reconnect_max_delay_ms,
            ),
            reconnect_jitter: parse_env(var("RECONNECT_JITTER"), defaults.reconnect_jitter),
            symbol_average_window: parse_env(
                var("AVERAGE_WINDOW"),
                defaults.symbol_average_window,
            ),
            features: FeatureFlags {
                reconnect: parse_env_bool(var("ENABLE_RECONNECT"), flags.reconnect),
                auto_refresh: parse_env_bool(var("ENABLE_AUTO_REFRESH"), flags.auto_refresh),
                heartbeat: parse_env_bool(var("ENABLE_HEARTBEAT"), flags.heartbeat),
                global_throughput: parse_env_bool(
                    var("ENABLE_GLOBAL_THROUGHPUT"),
                    flags.global_throughput,
                ),
                symbol_throughput: parse_env_bool(
                    var("ENABLE_SYMBOL_THROUGHPUT"),
                    flags.symbol_throughput,
                ),
                symbol_averages: parse_env_bool(
                    var("ENABLE_SYMBOL_AVERAGES"),
                    flags.symbol_averages,
                ),
                latency: parse_env_bool(var("ENABLE_LATENCY"), flags.latency),
            },
            verbose_metrics: parse_env_bool(var("VERBOSE_METRICS"), defaults.verbose_metrics),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::EmptyValue("url".to_string()));
        }
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(self.url.clone()));
        }
        if !self.report_interval_minutes.is_finite() || self.report_interval_minutes <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "report_interval_minutes",
                reason: "must be a positive number".to_string(),
            });
        }
        if self.report_interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(ConfigError::OutOfRange {
                field: "report_interval_minutes",
                reason: format!("must not exceed {MAX_INTERVAL_MINUTES}"),
            });
        }
        if self.report_interval().as_millis() == 0 {
            return Err(ConfigError::OutOfRange {
                field: "report_interval_minutes",
                reason: "must be at least one millisecond".to_string(),
            });
        }
        if !self.refresh_interval_minutes.is_finite()
            || self.refresh_interval_minutes > MAX_INTERVAL_MINUTES
        {
            return Err(ConfigError::OutOfRange {
                field: "refresh_interval_minutes",
                reason: format!("must be a finite number not above {MAX_INTERVAL_MINUTES}"),
            });
        }
        if self.heartbeat_threshold_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "heartbeat_threshold_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.reconnect_base_delay_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "reconnect_base_delay_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.reconnect_max_delay_ms < self.reconnect_base_delay_ms {
            return Err(ConfigError::OutOfRange {
                field: "reconnect_max_delay_ms",
                reason: format!(
                    "must not be below reconnect_base_delay_ms ({})",
                    self.reconnect_base_delay_ms
                ),
            });
        }
        if !(0.0..1.0).contains(&self.reconnect_jitter) {
            return Err(ConfigError::OutOfRange {
                field: "reconnect_jitter",
                reason: "must be in [0, 1)".to_string(),
            });
        }
        if self.symbol_average_window == 0 {
            return Err(ConfigError::OutOfRange {
                field: "symbol_average_window",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Report interval as a duration.
    #[must_use]
    pub fn report_interval(&self) -> Duration {
        minutes(self.report_interval_minutes)
    }

    /// Refresh interval as a duration; zero when disabled.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        minutes(self.refresh_interval_minutes)
    }

    /// Metrics engine settings.
    #[must_use]
    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            report_interval: self.report_interval(),
            average_window: self.symbol_average_window,
            global_throughput: self.features.global_throughput,
            symbol_throughput: self.features.symbol_throughput,
            symbol_averages: self.features.symbol_averages,
            latency: self.features.latency,
        }
    }

    /// Heartbeat monitor settings.
    #[must_use]
    pub const fn heartbeat_config(&self) -> HeartbeatConfig {
        HeartbeatConfig::with_threshold(Duration::from_secs(self.heartbeat_threshold_secs))
    }

    /// Reconnect policy settings.
    #[must_use]
    pub const fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig::new(
            Duration::from_millis(self.reconnect_base_delay_ms),
            Duration::from_millis(self.reconnect_max_delay_ms),
            self.reconnect_jitter,
        )
    }

    /// Auto-refresh scheduler.
    #[must_use]
    pub fn refresh_scheduler(&self) -> RefreshScheduler {
        RefreshScheduler::new(self.refresh_interval(), self.features.auto_refresh)
    }
}

/// Settings for the `quote-stream` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Stream settings.
    pub stream: StreamConfig,
    /// Symbols subscribed at startup.
    pub symbols: Vec<String>,
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
    /// Install the Prometheus recorder.
    pub metrics_enabled: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            symbols: Vec::new(),
            health_port: 8082,
            metrics_enabled: true,
        }
    }
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream configuration fails validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let stream = StreamConfig::from_lookup(&lookup)?;
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let symbols = var("SYMBOLS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            stream,
            symbols,
            health_port: parse_env(var("HEALTH_PORT"), defaults.health_port),
            metrics_enabled: parse_env_bool(var("METRICS_ENABLED"), defaults.metrics_enabled),
        })
    }

    /// Build from a fixed map, for tests and embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream configuration fails validation.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Setting has an empty value.
    #[error("setting {0} cannot be empty")]
    EmptyValue(String),
    /// Endpoint is not a WebSocket URL.
    #[error("invalid stream url {0}: expected ws:// or wss://")]
    InvalidUrl(String),
    /// Setting is outside its allowed range.
    #[error("setting {field} out of range: {reason}")]
    OutOfRange {
        /// Offending setting.
        field: &'static str,
        /// What the setting must satisfy.
        reason: String,
    },
}

fn minutes(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value * 60.0).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

fn parse_env<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool(value: Option<String>, default: bool) -> bool {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
