//! Auto-Refresh Scheduler
//!
//! The streamer occasionally stops pushing updates for a subscription
//! without closing the socket. Periodically cycling the full set
//! (unsubscribe, then subscribe) keeps the feed fresh. The registry itself
//! is never cleared.

use std::time::Duration;

use crate::domain::streaming::ConnectionState;
use crate::domain::subscription::{SubscriptionCommand, SymbolRegistry};

/// Periodic resubscription planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshScheduler {
    interval: Option<Duration>,
    cycles: u64,
}

impl RefreshScheduler {
    /// Create a scheduler. A zero interval or `enabled == false` disables it.
    #[must_use]
    pub const fn new(interval: Duration, enabled: bool) -> Self {
        let interval = if enabled && !interval.is_zero() {
            Some(interval)
        } else {
            None
        };
        Self {
            interval,
            cycles: 0,
        }
    }

    /// Refresh cadence, `None` when disabled.
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Whether refreshing is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Commands to send for one refresh tick.
    ///
    /// Empty unless the scheduler is enabled, the connection is open and at
    /// least one symbol is subscribed.
    pub fn on_tick(
        &mut self,
        state: ConnectionState,
        registry: &SymbolRegistry,
    ) -> Vec<SubscriptionCommand> {
        if !self.is_enabled() || state != ConnectionState::Open || registry.is_empty() {
            return Vec::new();
        }
        self.cycles = self.cycles.saturating_add(1);
        let symbols = registry.snapshot();
        vec![
            SubscriptionCommand::Unsubscribe(symbols.clone()),
            SubscriptionCommand::Subscribe(symbols),
        ]
    }

    /// Number of refresh cycles planned so far.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }
}
