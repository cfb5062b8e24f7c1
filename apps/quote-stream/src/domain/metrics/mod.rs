//! Stream Metrics
//!
//! Rolling throughput windows, per-symbol moving averages and latency
//! sampling for a quote stream.
//!
//! # Reporting
//!
//! Global and per-symbol reports share one report clock. `poll_report` is
//! called opportunistically (on frame arrival); once a full interval has
//! elapsed since the previous report it prunes every window to the report
//! instant, takes each window's length once, and pushes that count onto the
//! symbol's bounded history. The report clock resets; the windows do not.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::streaming::{
    LatencyInfo, Quote, SymbolAveragesInfo, SymbolThroughputInfo, ThroughputInfo,
};

// =============================================================================
// Configuration
// =============================================================================

/// Metrics engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Window length and report cadence.
    pub report_interval: Duration,
    /// Number of per-interval counts averaged per symbol.
    pub average_window: usize,
    /// Track and report global throughput.
    pub global_throughput: bool,
    /// Report per-symbol throughput.
    pub symbol_throughput: bool,
    /// Report per-symbol moving averages.
    pub symbol_averages: bool,
    /// Sample per-quote latency.
    pub latency: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(60),
            average_window: 5,
            global_throughput: true,
            symbol_throughput: true,
            symbol_averages: true,
            latency: true,
        }
    }
}

impl MetricsConfig {
    fn interval_ms(&self) -> i64 {
        i64::try_from(self.report_interval.as_millis()).unwrap_or(i64::MAX)
    }

    fn interval_minutes(&self) -> f64 {
        self.report_interval.as_secs_f64() / 60.0
    }

    const fn tracks_symbols(&self) -> bool {
        self.symbol_throughput || self.symbol_averages
    }
}

// =============================================================================
// Throughput Window
// =============================================================================

/// Time-ordered arrival timestamps bounded to one interval.
///
/// Entries are milliseconds since the Unix epoch. After pruning at `now` the
/// window holds only entries with `t >= now - interval`.
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    entries: VecDeque<i64>,
    interval_ms: i64,
}

impl ThroughputWindow {
    /// Create an empty window.
    #[must_use]
    pub const fn new(interval_ms: i64) -> Self {
        Self {
            entries: VecDeque::new(),
            interval_ms,
        }
    }

    /// Append an arrival and prune.
    pub fn record(&mut self, now_ms: i64) {
        self.entries.push_back(now_ms);
        self.prune(now_ms);
    }

    /// Drop entries older than one interval before `now_ms`.
    pub fn prune(&mut self, now_ms: i64) {
        let cutoff = now_ms.saturating_sub(self.interval_ms);
        while self.entries.front().is_some_and(|&t| t < cutoff) {
            self.entries.pop_front();
        }
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest retained entry.
    #[must_use]
    pub fn oldest(&self) -> Option<i64> {
        self.entries.front().copied()
    }
}

// =============================================================================
// Symbol Average History
// =============================================================================

/// Bounded queue of per-interval counts for one symbol.
#[derive(Debug, Clone)]
pub struct SymbolAverageHistory {
    samples: VecDeque<usize>,
    capacity: usize,
}

impl SymbolAverageHistory {
    /// Create an empty history holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample, evicting the oldest past capacity.
    pub fn push(&mut self, count: usize) {
        self.samples.push_back(count);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Arithmetic mean of the held samples, `0.0` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: usize = self.samples.iter().sum();
        sum as f64 / self.samples.len() as f64
    }

    /// Number of held samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether every held sample is zero.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.samples.iter().all(|&count| count == 0)
    }
}

// =============================================================================
// Metrics Engine
// =============================================================================

/// Reports produced at one report tick. Disabled reports are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsReport {
    /// Global throughput.
    pub throughput: Option<ThroughputInfo>,
    /// Per-symbol throughput.
    pub symbol_throughput: Option<SymbolThroughputInfo>,
    /// Per-symbol moving averages.
    pub symbol_averages: Option<SymbolAveragesInfo>,
}

/// Throughput, moving-average and latency bookkeeping for one session.
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    config: MetricsConfig,
    global: ThroughputWindow,
    symbols: BTreeMap<String, ThroughputWindow>,
    histories: BTreeMap<String, SymbolAverageHistory>,
    last_report: DateTime<Utc>,
    last_latency_ms: Option<i64>,
}

impl MetricsEngine {
    /// Create an engine whose report clock starts at `start`.
    #[must_use]
    pub fn new(config: MetricsConfig, start: DateTime<Utc>) -> Self {
        let interval_ms = config.interval_ms();
        Self {
            config,
            global: ThroughputWindow::new(interval_ms),
            symbols: BTreeMap::new(),
            histories: BTreeMap::new(),
            last_report: start,
            last_latency_ms: None,
        }
    }

    /// Engine settings.
    #[must_use]
    pub const fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Count one inbound frame in the global window.
    pub fn record_global(&mut self, now: DateTime<Utc>) {
        if self.config.global_throughput {
            self.global.record(now.timestamp_millis());
        }
    }

    /// Count one quote for `symbol`.
    pub fn record_symbol(&mut self, symbol: &str, now: DateTime<Utc>) {
        if !self.config.tracks_symbols() {
            return;
        }
        let interval_ms = self.config.interval_ms();
        self.symbols
            .entry(symbol.to_string())
            .or_insert_with(|| ThroughputWindow::new(interval_ms))
            .record(now.timestamp_millis());
    }

    /// Sample feed-to-receipt latency for a quote.
    ///
    /// Returns `None` when latency sampling is disabled.
    pub fn record_latency(&mut self, quote: &Quote) -> Option<LatencyInfo> {
        if !self.config.latency {
            return None;
        }
        let latency_ms = quote
            .received_at
            .signed_duration_since(quote.event_time)
            .num_milliseconds();
        self.last_latency_ms = Some(latency_ms);
        Some(LatencyInfo {
            symbol: quote.symbol.clone(),
            latency_ms,
            event_time: quote.event_time,
            received_at: quote.received_at,
        })
    }

    /// Produce the due reports if a full interval has elapsed.
    pub fn poll_report(&mut self, now: DateTime<Utc>) -> Option<MetricsReport> {
        let elapsed_ms = now
            .signed_duration_since(self.last_report)
            .num_milliseconds();
        if elapsed_ms < self.config.interval_ms() {
            return None;
        }
        self.last_report = now;

        let now_ms = now.timestamp_millis();
        let interval_minutes = self.config.interval_minutes();
        let mut report = MetricsReport::default();

        if self.config.global_throughput {
            self.global.prune(now_ms);
            report.throughput = Some(ThroughputInfo {
                count: self.global.len(),
                interval_minutes,
                timestamp: now,
            });
        }

        if self.config.tracks_symbols() {
            let counts: BTreeMap<String, usize> = self
                .symbols
                .iter_mut()
                .map(|(symbol, window)| {
                    window.prune(now_ms);
                    (symbol.clone(), window.len())
                })
                .collect();

            if self.config.symbol_averages {
                let capacity = self.config.average_window;
                let averages = counts
                    .iter()
                    .map(|(symbol, &count)| {
                        let history = self
                            .histories
                            .entry(symbol.clone())
                            .or_insert_with(|| SymbolAverageHistory::new(capacity));
                        history.push(count);
                        (symbol.clone(), history.average())
                    })
                    .collect();
                report.symbol_averages = Some(SymbolAveragesInfo {
                    per_symbol_average: averages,
                    window_size: capacity,
                    timestamp: now,
                });
            }

            if self.config.symbol_throughput {
                report.symbol_throughput = Some(SymbolThroughputInfo {
                    per_symbol_count: counts,
                    interval_minutes,
                    timestamp: now,
                });
            }

            self.retire_idle_symbols();
        }

        Some(report)
    }

    /// Stop tracking symbols.
    ///
    /// They drop out of later reports until quotes for them arrive again.
    pub fn forget<S: AsRef<str>>(&mut self, symbols: &[S]) {
        for symbol in symbols {
            self.symbols.remove(symbol.as_ref());
            self.histories.remove(symbol.as_ref());
        }
    }

    /// Symbols currently carried in per-symbol reports.
    #[must_use]
    pub fn tracked_symbols(&self) -> Vec<String> {
        self.symbols.keys().cloned().collect()
    }

    /// Drop symbols with an empty window whose history holds only zeros.
    ///
    /// A symbol that goes quiet is reported with its decaying average until
    /// the average reaches zero, then removed.
    fn retire_idle_symbols(&mut self) {
        let histories = &mut self.histories;
        self.symbols.retain(|symbol, window| {
            let idle = window.is_empty()
                && histories
                    .get(symbol)
                    .is_none_or(SymbolAverageHistory::is_idle);
            if idle {
                histories.remove(symbol);
            }
            !idle
        });
    }

    /// Current global window length.
    #[must_use]
    pub fn global_count(&self) -> usize {
        self.global.len()
    }

    /// Current window length for a symbol.
    #[must_use]
    pub fn symbol_count(&self, symbol: &str) -> usize {
        self.symbols.get(symbol).map_or(0, ThroughputWindow::len)
    }

    /// Most recent latency sample.
    #[must_use]
    pub const fn last_latency_ms(&self) -> Option<i64> {
        self.last_latency_ms
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::streaming::{MarketHours, QuoteKind};
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn secs(n: i64) -> DateTime<Utc> {
        t0() + TimeDelta::seconds(n)
    }

    fn quote(symbol: &str, event_ms: i64, received_ms: i64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price: 1.0,
            event_time: DateTime::from_timestamp_millis(event_ms).unwrap(),
            received_at: DateTime::from_timestamp_millis(received_ms).unwrap(),
            kind: QuoteKind::Equity,
            market_hours: MarketHours::RegularMarket,
            exchange: None,
            currency: None,
            change_percent: None,
            day_volume: None,
        }
    }

    #[test]
    fn window_prunes_entries_older_than_interval() {
        let mut window = ThroughputWindow::new(60_000);
        window.record(0);
        window.record(30_000);
        window.record(60_000);
        assert_eq!(window.len(), 3);

        window.record(90_001);
        assert_eq!(window.len(), 2);
        assert_eq!(window.oldest(), Some(60_000));
    }

    #[test]
    fn window_keeps_entry_exactly_one_interval_old() {
        let mut window = ThroughputWindow::new(1_000);
        window.record(0);
        window.prune(1_000);
        assert_eq!(window.len(), 1);
        window.prune(1_001);
        assert!(window.is_empty());
    }

    #[test]
    fn history_average_of_full_window() {
        let mut history = SymbolAverageHistory::new(5);
        for count in [2, 4, 6, 8, 10] {
            history.push(count);
        }
        assert!((history.average() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn history_evicts_oldest() {
        let mut history = SymbolAverageHistory::new(2);
        history.push(100);
        history.push(2);
        history.push(4);
        assert_eq!(history.len(), 2);
        assert!((history.average() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn history_empty_average_is_zero() {
        let history = SymbolAverageHistory::new(3);
        assert!(history.is_empty());
        assert!(history.average().abs() < f64::EPSILON);
    }

    #[test]
    fn quiet_symbol_decays_then_drops_out() {
        let config = MetricsConfig {
            average_window: 2,
            ..MetricsConfig::default()
        };
        let mut engine = MetricsEngine::new(config, t0());
        engine.record_symbol("AAPL", secs(10));

        let first = engine.poll_report(secs(60)).unwrap();
        assert_eq!(first.symbol_throughput.unwrap().per_symbol_count["AAPL"], 1);

        // Window empty, history [1, 0]: still reported.
        let second = engine.poll_report(secs(121)).unwrap();
        assert_eq!(second.symbol_throughput.unwrap().per_symbol_count["AAPL"], 0);
        assert!((second.symbol_averages.unwrap().per_symbol_average["AAPL"] - 0.5).abs() < f64::EPSILON);

        // History [0, 0]: reported at zero once more, then retired.
        let third = engine.poll_report(secs(182)).unwrap();
        assert!(third.symbol_averages.unwrap().per_symbol_average["AAPL"].abs() < f64::EPSILON);
        assert!(engine.tracked_symbols().is_empty());

        let fourth = engine.poll_report(secs(243)).unwrap();
        assert!(fourth.symbol_throughput.unwrap().per_symbol_count.is_empty());
        assert!(fourth.symbol_averages.unwrap().per_symbol_average.is_empty());
    }

    #[test]
    fn quiet_symbol_without_averages_drops_after_one_zero() {
        let config = MetricsConfig {
            symbol_averages: false,
            ..MetricsConfig::default()
        };
        let mut engine = MetricsEngine::new(config, t0());
        engine.record_symbol("MSFT", secs(10));
        engine.poll_report(secs(60)).unwrap();

        let report = engine.poll_report(secs(121)).unwrap();
        assert_eq!(report.symbol_throughput.unwrap().per_symbol_count["MSFT"], 0);
        assert!(engine.tracked_symbols().is_empty());
    }

    #[test]
    fn forget_removes_symbol_from_reports() {
        let mut engine = MetricsEngine::new(MetricsConfig::default(), t0());
        engine.record_symbol("AAPL", secs(10));
        engine.record_symbol("MSFT", secs(10));

        engine.forget(&["AAPL"]);
        let report = engine.poll_report(secs(60)).unwrap();

        let counts = report.symbol_throughput.unwrap().per_symbol_count;
        assert_eq!(counts.keys().collect::<Vec<_>>(), vec!["MSFT"]);
        assert_eq!(engine.symbol_count("AAPL"), 0);
    }

    #[test]
    fn no_report_before_interval() {
        let mut engine = MetricsEngine::new(MetricsConfig::default(), t0());
        engine.record_global(secs(10));
        assert!(engine.poll_report(secs(59)).is_none());
    }

    #[test]
    fn report_after_interval_resets_clock_not_windows() {
        let mut engine = MetricsEngine::new(MetricsConfig::default(), t0());
        engine.record_global(secs(10));
        engine.record_symbol("AAPL", secs(10));
        engine.record_global(secs(50));
        engine.record_symbol("AAPL", secs(50));

        let report = engine.poll_report(secs(60)).unwrap();
        assert_eq!(report.throughput.unwrap().count, 2);
        assert_eq!(
            report.symbol_throughput.unwrap().per_symbol_count["AAPL"],
            2
        );
        let averages = report.symbol_averages.unwrap();
        assert_eq!(averages.window_size, 5);
        assert!((averages.per_symbol_average["AAPL"] - 2.0).abs() < f64::EPSILON);

        // Clock reset: next report only after another interval.
        assert!(engine.poll_report(secs(100)).is_none());
        // Windows kept: the entry at 50s is still within range at 100s.
        assert_eq!(engine.global_count(), 2);
    }

    #[test]
    fn report_prunes_to_report_instant() {
        let mut engine = MetricsEngine::new(MetricsConfig::default(), t0());
        engine.record_global(secs(1));
        engine.record_symbol("MSFT", secs(1));

        let report = engine.poll_report(secs(120)).unwrap();
        assert_eq!(report.throughput.unwrap().count, 0);
        assert_eq!(
            report.symbol_throughput.unwrap().per_symbol_count["MSFT"],
            0
        );
    }

    #[test]
    fn averages_decay_for_quiet_symbols() {
        let mut engine = MetricsEngine::new(MetricsConfig::default(), t0());
        for s in 0..4 {
            engine.record_symbol("TSLA", secs(s));
        }
        let first = engine.poll_report(secs(60)).unwrap();
        assert!((first.symbol_averages.unwrap().per_symbol_average["TSLA"] - 4.0).abs() < 1e-9);

        let second = engine.poll_report(secs(200)).unwrap();
        assert!((second.symbol_averages.unwrap().per_symbol_average["TSLA"] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn disabled_reports_are_absent() {
        let config = MetricsConfig {
            global_throughput: false,
            symbol_throughput: false,
            ..MetricsConfig::default()
        };
        let mut engine = MetricsEngine::new(config, t0());
        engine.record_global(secs(1));
        engine.record_symbol("AAPL", secs(1));

        let report = engine.poll_report(secs(60)).unwrap();
        assert!(report.throughput.is_none());
        assert!(report.symbol_throughput.is_none());
        assert!(report.symbol_averages.is_some());
        assert_eq!(engine.global_count(), 0);
        assert_eq!(engine.symbol_count("AAPL"), 1);
    }

    #[test]
    fn interval_minutes_reported() {
        let config = MetricsConfig {
            report_interval: Duration::from_secs(30),
            ..MetricsConfig::default()
        };
        let mut engine = MetricsEngine::new(config, t0());
        let report = engine.poll_report(secs(30)).unwrap();
        assert!((report.throughput.unwrap().interval_minutes - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn latency_is_receipt_minus_event_time() {
        let mut engine = MetricsEngine::new(MetricsConfig::default(), t0());
        let info = engine.record_latency(&quote("AAPL", 1_000, 1_250)).unwrap();
        assert_eq!(info.latency_ms, 250);
        assert_eq!(info.symbol, "AAPL");
        assert_eq!(engine.last_latency_ms(), Some(250));
    }

    #[test]
    fn latency_may_be_negative() {
        let mut engine = MetricsEngine::new(MetricsConfig::default(), t0());
        let info = engine.record_latency(&quote("AAPL", 2_000, 1_500)).unwrap();
        assert_eq!(info.latency_ms, -500);
    }

    #[test]
    fn latency_disabled() {
        let config = MetricsConfig {
            latency: false,
            ..MetricsConfig::default()
        };
        let mut engine = MetricsEngine::new(config, t0());
        assert!(engine.record_latency(&quote("AAPL", 0, 10)).is_none());
    }
}
