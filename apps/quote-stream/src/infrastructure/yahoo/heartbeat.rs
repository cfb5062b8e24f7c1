//! Heartbeat Monitor
//!
//! Detects silent feed failures from gaps between inbound data frames.
//! The feed sends no application-level heartbeat, so a connection can stay
//! open while delivering nothing; the monitor reports that as `alive: false`.
//!
//! The monitor is passive. It reports liveness on every check and leaves the
//! decision to reconnect to the consumer (see `force_reconnect`).

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::streaming::HeartbeatInfo;

/// Liveness check cadence.
pub const HEARTBEAT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between liveness checks.
    pub check_interval: Duration,
    /// Maximum tolerated gap between data frames.
    pub threshold: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            check_interval: HEARTBEAT_CHECK_INTERVAL,
            threshold: Duration::from_secs(30),
        }
    }
}

impl HeartbeatConfig {
    /// Create a configuration with the fixed check interval.
    #[must_use]
    pub const fn with_threshold(threshold: Duration) -> Self {
        Self {
            check_interval: HEARTBEAT_CHECK_INTERVAL,
            threshold,
        }
    }
}

/// Last observed data time and the most recent liveness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatState {
    /// Time of the last inbound data frame (or session start).
    pub last_message_time: DateTime<Utc>,
    /// Result of the most recent check.
    pub alive: bool,
}

/// Gap-based liveness monitor.
///
/// # Example
///
/// ```rust
/// use chrono::{DateTime, TimeDelta};
/// use quote_stream::infrastructure::yahoo::heartbeat::{HeartbeatConfig, HeartbeatMonitor};
///
/// let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
/// let mut monitor = HeartbeatMonitor::new(HeartbeatConfig::default(), start);
///
/// let info = monitor.check(start + TimeDelta::seconds(45));
/// assert!(!info.alive);
/// assert_eq!(info.threshold_seconds, 30);
/// ```
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    state: HeartbeatState,
}

impl HeartbeatMonitor {
    /// Create a monitor; the gap is measured from `start` until data arrives.
    #[must_use]
    pub const fn new(config: HeartbeatConfig, start: DateTime<Utc>) -> Self {
        Self {
            config,
            state: HeartbeatState {
                last_message_time: start,
                alive: true,
            },
        }
    }

    /// Record an inbound data frame.
    pub const fn touch(&mut self, now: DateTime<Utc>) {
        self.state.last_message_time = now;
    }

    /// Run one liveness check.
    pub fn check(&mut self, now: DateTime<Utc>) -> HeartbeatInfo {
        let age_ms = now
            .signed_duration_since(self.state.last_message_time)
            .num_milliseconds()
            .max(0);
        let threshold_ms = i64::try_from(self.config.threshold.as_millis()).unwrap_or(i64::MAX);
        let alive = age_ms <= threshold_ms;

        if self.state.alive && !alive {
            tracing::warn!(
                age_ms,
                threshold_ms,
                "No data within heartbeat threshold"
            );
        } else if !self.state.alive && alive {
            tracing::info!(age_ms, "Data flow resumed");
        }
        self.state.alive = alive;

        #[allow(clippy::cast_precision_loss)]
        let age_seconds = age_ms as f64 / 1000.0;

        HeartbeatInfo {
            alive,
            threshold_seconds: self.config.threshold.as_secs(),
            age_seconds,
            last_message_time: self.state.last_message_time,
            checked_at: now,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> HeartbeatState {
        self.state
    }

    /// Monitor configuration.
    #[must_use]
    pub const fn config(&self) -> &HeartbeatConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn default_config_values() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(1));
        assert_eq!(config.threshold, Duration::from_secs(30));
    }

    #[test]
    fn stale_after_threshold() {
        let mut monitor = HeartbeatMonitor::new(HeartbeatConfig::default(), t0());

        let info = monitor.check(t0() + TimeDelta::seconds(45));

        assert!(!info.alive);
        assert_eq!(info.threshold_seconds, 30);
        assert!((info.age_seconds - 45.0).abs() < f64::EPSILON);
        assert_eq!(info.last_message_time, t0());
        assert!(!monitor.state().alive);
    }

    #[test]
    fn alive_at_exact_threshold() {
        let mut monitor = HeartbeatMonitor::new(HeartbeatConfig::default(), t0());
        assert!(monitor.check(t0() + TimeDelta::seconds(30)).alive);
    }

    #[test]
    fn touch_restores_liveness() {
        let mut monitor = HeartbeatMonitor::new(
            HeartbeatConfig::with_threshold(Duration::from_secs(5)),
            t0(),
        );
        assert!(!monitor.check(t0() + TimeDelta::seconds(10)).alive);

        monitor.touch(t0() + TimeDelta::seconds(10));
        let info = monitor.check(t0() + TimeDelta::seconds(11));

        assert!(info.alive);
        assert!((info.age_seconds - 1.0).abs() < f64::EPSILON);
        assert_eq!(info.checked_at, t0() + TimeDelta::seconds(11));
    }

    #[test]
    fn age_never_negative() {
        let mut monitor = HeartbeatMonitor::new(HeartbeatConfig::default(), t0());
        let info = monitor.check(t0() - TimeDelta::seconds(1));
        assert!(info.age_seconds.abs() < f64::EPSILON);
        assert!(info.alive);
    }
}
