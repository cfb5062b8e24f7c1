//! Property-based tests for registry, backoff and window invariants.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeSet;
use std::time::Duration;

use proptest::prelude::*;
use quote_stream::SymbolRegistry;
use quote_stream::domain::metrics::{SymbolAverageHistory, ThroughputWindow};
use quote_stream::infrastructure::yahoo::{ReconnectConfig, ReconnectPolicy};

/// Ticker-like identifiers, including some with padding.
fn arb_symbol() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Z]{1,5}",
        "[A-Z]{2,4}-USD",
        " [A-Z]{1,4} ",
    ]
}

fn arb_symbols() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_symbol(), 0..12)
}

fn policy(base_ms: u64, max_ms: u64) -> ReconnectPolicy {
    ReconnectPolicy::new(ReconnectConfig::new(
        Duration::from_millis(base_ms),
        Duration::from_millis(max_ms),
        0.0,
    ))
}

proptest! {
    /// Snapshots are sorted, deduplicated and trimmed.
    #[test]
    fn snapshot_is_sorted_and_unique(symbols in arb_symbols()) {
        let mut registry = SymbolRegistry::new();
        registry.add(&symbols);

        let snapshot = registry.snapshot();
        let expected: Vec<String> = symbols
            .iter()
            .map(|s| s.trim().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        prop_assert_eq!(snapshot, expected);
    }

    /// Subscribing new symbols then unsubscribing them restores the set.
    #[test]
    fn subscribe_then_unsubscribe_restores(existing in arb_symbols(), added in arb_symbols()) {
        let mut registry = SymbolRegistry::new();
        registry.add(&existing);
        let before = registry.snapshot();

        let fresh: Vec<String> = added
            .iter()
            .filter(|s| !registry.contains(s.trim()))
            .cloned()
            .collect();
        registry.add(&fresh);
        registry.remove(&fresh);

        prop_assert_eq!(registry.snapshot(), before);
    }

    /// A command lists only symbols whose membership changed, each once.
    #[test]
    fn commands_carry_only_the_delta(existing in arb_symbols(), added in arb_symbols()) {
        let mut registry = SymbolRegistry::new();
        registry.add(&existing);
        let before: BTreeSet<String> = registry.snapshot().into_iter().collect();

        let command = registry.add(&added);

        let after: BTreeSet<String> = registry.snapshot().into_iter().collect();
        let delta: Vec<String> = after.difference(&before).cloned().collect();
        match command {
            Some(command) => prop_assert_eq!(command.symbols().to_vec(), delta),
            None => prop_assert!(delta.is_empty()),
        }
    }

    /// Backoff follows min(max, base * 2^(n-1)) and never decreases.
    #[test]
    fn backoff_is_capped_and_monotonic(
        base_ms in 1u64..10_000,
        extra_ms in 0u64..600_000,
        attempts in 1u32..80,
    ) {
        let max_ms = base_ms + extra_ms;
        let policy = policy(base_ms, max_ms);

        let mut previous = Duration::ZERO;
        for n in 1..=attempts {
            let delay = policy.delay_for(n);
            let uncapped = u128::from(base_ms).saturating_mul(1u128 << (n - 1).min(100));
            let expected = uncapped.min(u128::from(max_ms));
            prop_assert_eq!(delay.as_millis(), expected);
            prop_assert!(delay >= previous);
            previous = delay;
        }
    }

    /// Consecutive scheduled delays match the closed form.
    #[test]
    fn next_delay_tracks_attempts(failures in 1u32..20) {
        let mut policy = policy(1_000, 60_000);
        for n in 1..=failures {
            let delay = policy.next_delay();
            prop_assert_eq!(policy.attempt_count(), n);
            prop_assert_eq!(delay, policy.delay_for(n));
        }
        policy.reset();
        prop_assert_eq!(policy.attempt_count(), 0);
        prop_assert_eq!(policy.next_delay(), Duration::from_millis(1_000));
    }

    /// After pruning, nothing older than one interval is counted.
    #[test]
    fn window_holds_only_recent_entries(
        interval_ms in 1i64..120_000,
        mut gaps in prop::collection::vec(0i64..30_000, 1..64),
    ) {
        let mut window = ThroughputWindow::new(interval_ms);
        let mut now = 1_700_000_000_000i64;
        let mut times = Vec::new();
        for gap in gaps.drain(..) {
            now += gap;
            window.record(now);
            times.push(now);
        }

        let expected = times.iter().filter(|&&t| t >= now - interval_ms).count();
        prop_assert_eq!(window.len(), expected);
        if let Some(oldest) = window.oldest() {
            prop_assert!(oldest >= now - interval_ms);
        }
    }

    /// Moving average equals the mean of the last `capacity` samples.
    #[test]
    fn average_covers_last_samples(
        capacity in 1usize..10,
        counts in prop::collection::vec(0usize..1_000, 1..40),
    ) {
        let mut history = SymbolAverageHistory::new(capacity);
        for &count in &counts {
            history.push(count);
        }

        let tail = &counts[counts.len().saturating_sub(capacity)..];
        #[allow(clippy::cast_precision_loss)]
        let expected = tail.iter().sum::<usize>() as f64 / tail.len() as f64;
        prop_assert_eq!(history.len(), tail.len());
        prop_assert!((history.average() - expected).abs() < 1e-9);
    }
}
