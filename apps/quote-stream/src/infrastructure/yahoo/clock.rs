//! Session Clock
//!
//! Wall-clock timestamps derived from the tokio monotonic clock, anchored
//! at session start. Elapsed time never jumps with the system clock, and
//! under a paused test runtime it advances only with `tokio::time`.

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Monotonic wall clock for one session.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin_instant: Instant,
    origin_wall: DateTime<Utc>,
}

impl SessionClock {
    /// Anchor a clock at the current instant and system time.
    #[must_use]
    pub fn start() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Anchor a clock at the current instant, reporting `origin` as its time.
    #[must_use]
    pub fn anchored_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin_instant: Instant::now(),
            origin_wall: origin,
        }
    }

    /// Current session time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.origin_instant.elapsed()).unwrap_or(TimeDelta::MAX);
        self.origin_wall
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Wall time the clock was anchored at.
    #[must_use]
    pub const fn origin(&self) -> DateTime<Utc> {
        self.origin_wall
    }
}
