use std::{
    collections::{BTreeMap, HashMap},
    hash::BuildHasher,
};

use rust_decimal::Decimal;

/// Snapshot of the latest market prices, keyed by symbol.
///
/// The engine only reads a feed for the duration of a call and never retains it.
pub trait PriceFeed {
    /// Returns the latest price of `symbol`, if quoted.
    fn price(&self, symbol: &str) -> Option<Decimal>;
}

impl<S: BuildHasher> PriceFeed for HashMap<String, Decimal, S> {
    fn price(&self, symbol: &str) -> Option<Decimal> {
        self.get(symbol).copied()
    }
}

impl PriceFeed for BTreeMap<String, Decimal> {
    fn price(&self, symbol: &str) -> Option<Decimal> {
        self.get(symbol).copied()
    }
}
