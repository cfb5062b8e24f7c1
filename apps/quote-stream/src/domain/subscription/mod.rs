//! Subscription Registry
//!
//! Canonical set of symbols a session is subscribed to, and the protocol
//! commands derived from changes to it.
//!
//! # Design
//!
//! The registry keeps symbols in a `BTreeSet`, so every snapshot and every
//! command it produces is sorted and deduplicated. `add` and `remove` return
//! only the symbols whose membership actually changed; an empty change means
//! no transport traffic is needed.
//!
//! The set survives reconnects. The session replays `snapshot()` each time
//! the transport opens.

use std::collections::BTreeSet;

use serde::Serialize;

/// A symbol string (ticker, index, currency pair or option symbol).
pub type Symbol = String;

// =============================================================================
// Subscription Commands
// =============================================================================

/// Outbound subscription command.
///
/// Serializes to the feed's wire shape: `{"subscribe":["A","B"]}` or
/// `{"unsubscribe":["A","B"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionCommand {
    /// Start streaming the listed symbols.
    Subscribe(Vec<Symbol>),
    /// Stop streaming the listed symbols.
    Unsubscribe(Vec<Symbol>),
}

impl SubscriptionCommand {
    /// Symbols carried by the command.
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        match self {
            Self::Subscribe(symbols) | Self::Unsubscribe(symbols) => symbols,
        }
    }

    /// Command verb, for logging.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
        }
    }
}

// =============================================================================
// Symbol Registry
// =============================================================================

/// Ordered, deduplicated set of subscribed symbols.
///
/// # Example
///
/// ```rust
/// use quote_stream::domain::subscription::{SubscriptionCommand, SymbolRegistry};
///
/// let mut registry = SymbolRegistry::new();
///
/// let command = registry.add(["B", "A", "A"]);
/// assert_eq!(
///     command,
///     Some(SubscriptionCommand::Subscribe(vec!["A".to_string(), "B".to_string()]))
/// );
///
/// // Already subscribed - no command needed
/// assert_eq!(registry.add(["A"]), None);
///
/// assert_eq!(registry.snapshot(), vec!["A".to_string(), "B".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SymbolRegistry {
    symbols: BTreeSet<Symbol>,
}

impl SymbolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            symbols: BTreeSet::new(),
        }
    }

    /// Merge symbols into the set.
    ///
    /// Returns a subscribe command for the symbols that were not already
    /// present, or `None` when nothing changed. Identifiers are trimmed and
    /// blank ones ignored.
    pub fn add<I, S>(&mut self, symbols: I) -> Option<SubscriptionCommand>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let added: BTreeSet<Symbol> = normalize(symbols)
            .filter(|symbol| self.symbols.insert(symbol.clone()))
            .collect();

        (!added.is_empty()).then(|| SubscriptionCommand::Subscribe(added.into_iter().collect()))
    }

    /// Remove symbols from the set.
    ///
    /// Returns an unsubscribe command for the symbols that were present, or
    /// `None` when nothing changed.
    pub fn remove<I, S>(&mut self, symbols: I) -> Option<SubscriptionCommand>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed: BTreeSet<Symbol> = normalize(symbols)
            .filter(|symbol| self.symbols.remove(symbol))
            .collect();

        (!removed.is_empty())
            .then(|| SubscriptionCommand::Unsubscribe(removed.into_iter().collect()))
    }

    /// Current symbols, sorted.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Symbol> {
        self.symbols.iter().cloned().collect()
    }

    /// Subscribe command replaying the full set, or `None` when empty.
    #[must_use]
    pub fn replay(&self) -> Option<SubscriptionCommand> {
        (!self.is_empty()).then(|| SubscriptionCommand::Subscribe(self.snapshot()))
    }

    /// Whether a symbol is subscribed.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    /// Number of subscribed symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether no symbols are subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

fn normalize<I, S>(symbols: I) -> impl Iterator<Item = Symbol>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    symbols
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn add_sorts_and_deduplicates() {
        let mut registry = SymbolRegistry::new();

        let command = registry.add(["B", "A", "A"]);

        assert_eq!(
            command,
            Some(SubscriptionCommand::Subscribe(strings(&["A", "B"])))
        );
        assert_eq!(registry.snapshot(), strings(&["A", "B"]));
    }

    #[test]
    fn add_existing_symbol_is_silent() {
        let mut registry = SymbolRegistry::new();
        registry.add(["AAPL"]);

        assert_eq!(registry.add(["AAPL"]), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn add_partially_existing_only_reports_new() {
        let mut registry = SymbolRegistry::new();
        registry.add(["AAPL"]);

        let command = registry.add(["MSFT", "AAPL"]);

        assert_eq!(
            command,
            Some(SubscriptionCommand::Subscribe(strings(&["MSFT"])))
        );
    }

    #[test]
    fn remove_reports_only_present_symbols() {
        let mut registry = SymbolRegistry::new();
        registry.add(["AAPL", "MSFT"]);

        let command = registry.remove(["TSLA", "MSFT"]);

        assert_eq!(
            command,
            Some(SubscriptionCommand::Unsubscribe(strings(&["MSFT"])))
        );
        assert_eq!(registry.snapshot(), strings(&["AAPL"]));
    }

    #[test]
    fn remove_unknown_symbol_is_silent() {
        let mut registry = SymbolRegistry::new();

        assert_eq!(registry.remove(["AAPL"]), None);
    }

    #[test]
    fn blank_symbols_are_ignored_and_trimmed() {
        let mut registry = SymbolRegistry::new();

        let command = registry.add(["  ", "", " ES=F "]);

        assert_eq!(
            command,
            Some(SubscriptionCommand::Subscribe(strings(&["ES=F"])))
        );
        assert!(registry.contains("ES=F"));
    }

    #[test]
    fn replay_empty_registry() {
        let registry = SymbolRegistry::new();
        assert!(registry.replay().is_none());
    }

    #[test]
    fn replay_lists_full_set() {
        let mut registry = SymbolRegistry::new();
        registry.add(["TSLA", "AAPL"]);

        assert_eq!(
            registry.replay(),
            Some(SubscriptionCommand::Subscribe(strings(&["AAPL", "TSLA"])))
        );
    }

    #[test]
    fn command_wire_format() {
        let subscribe = SubscriptionCommand::Subscribe(strings(&["A", "B"]));
        let unsubscribe = SubscriptionCommand::Unsubscribe(strings(&["C"]));

        assert_eq!(
            serde_json::to_string(&subscribe).unwrap(),
            r#"{"subscribe":["A","B"]}"#
        );
        assert_eq!(
            serde_json::to_string(&unsubscribe).unwrap(),
            r#"{"unsubscribe":["C"]}"#
        );
        assert_eq!(unsubscribe.verb(), "unsubscribe");
        assert_eq!(subscribe.symbols(), strings(&["A", "B"]).as_slice());
    }
}
