use std::collections::{
    BTreeMap,
    btree_map::{Entry, Values},
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;

use crate::{
    engine::{OrderRequest, Position},
    errors::{Error, Result},
};

/// Where a position id was found in the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    Open,
    Closed,
    Unknown,
}

/// Open positions keyed by symbol, plus the closed history.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    open: BTreeMap<String, Position>,
    closed: Vec<Position>,
}

impl PositionBook {
    /// Returns an iterator over the open positions, ordered by symbol.
    pub fn open(&self) -> Values<'_, String, Position> {
        self.open.values()
    }

    /// Returns an iterator over the closed positions, oldest close first.
    pub fn closed(&self) -> std::slice::Iter<'_, Position> {
        self.closed.iter()
    }

    /// Returns the open position for `symbol`, if any.
    pub fn get_by_symbol(&self, symbol: &str) -> Option<&Position> {
        self.open.get(symbol)
    }

    /// Returns the open position carrying `id`, if any.
    pub fn get(&self, id: &str) -> Option<&Position> {
        self.open.values().find(|p| p.id() == id)
    }

    pub(crate) fn lookup(&self, id: &str) -> Lookup {
        if self.get(id).is_some() {
            Lookup::Open
        } else if self.closed.iter().any(|p| p.id() == id) {
            Lookup::Closed
        } else {
            Lookup::Unknown
        }
    }

    /// Checks whether `request` can be applied without touching the book.
    pub(crate) fn validate(&self, request: &OrderRequest) -> Result<()> {
        match self.open.get(&request.symbol) {
            Some(position) if position.side() != request.side.position_side() => Err(Error::OppositeSide {
                symbol: request.symbol.clone(),
            }),
            Some(position) if position.merged(request).is_none() => Err(Error::Overflow("average entry price")),
            _ => Ok(()),
        }
    }

    /// Creates a position for the request's symbol, or merges the request into the open one.
    ///
    /// ### Returns
    /// A copy of the resulting open position, or `OppositeSide` when the open position
    /// has the other side. The book is unchanged on error.
    pub(crate) fn open_or_increase(&mut self, request: &OrderRequest, at: DateTime<Utc>) -> Result<Position> {
        self.validate(request)?;
        let position = match self.open.entry(request.symbol.clone()) {
            Entry::Occupied(entry) => {
                let position = entry.into_mut();
                position.merge(request)?;
                position
            }
            Entry::Vacant(entry) => entry.insert(Position::open(request, at)),
        };
        Ok(position.clone())
    }

    /// Removes the open position carrying `id`.
    pub(crate) fn take(&mut self, id: &str) -> Option<Position> {
        let symbol = self.get(id)?.symbol().to_owned();
        self.open.remove(&symbol)
    }

    /// Appends a closed position to the history.
    pub(crate) fn archive(&mut self, position: Position) {
        self.closed.push(position);
    }

    /// Returns the ids and symbols of the open positions.
    pub(crate) fn open_ids(&self) -> Vec<(String, String)> {
        self.open
            .values()
            .map(|p| (p.id().to_owned(), p.symbol().to_owned()))
            .collect()
    }

    pub(crate) fn update<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Position),
    {
        match self.open.values_mut().find(|p| p.id() == id) {
            Some(position) => {
                f(position);
                true
            }
            None => false,
        }
    }

    /// Sums the mark-to-market profit/loss of the open positions priced by `price_of`.
    pub(crate) fn unrealized_pnl<F>(&self, price_of: F) -> Decimal
    where
        F: Fn(&str) -> Option<Decimal>,
    {
        self.open
            .values()
            .filter_map(|p| price_of(p.symbol()).map(|price| p.estimate_pnl(price)))
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Replaces the book with `positions`: closed ones (with a close time) go to the history.
    ///
    /// Only one open position per symbol is kept: the first one listed. Later ones are
    /// dropped with a warning.
    pub(crate) fn restore(&mut self, positions: Vec<Position>) {
        let (open, closed): (Vec<_>, Vec<_>) = positions.into_iter().partition(Position::is_open);
        self.open.clear();
        for position in open {
            match self.open.entry(position.symbol().to_owned()) {
                Entry::Vacant(entry) => {
                    entry.insert(position);
                }
                Entry::Occupied(entry) => warn!(
                    symbol = position.symbol(),
                    kept = entry.get().id(),
                    dropped = position.id(),
                    cost = %position.cost(),
                    "duplicate open position dropped on restore"
                ),
            }
        }
        self.closed = closed;
    }

    pub(crate) fn clear(&mut self) {
        self.open.clear();
        self.closed.clear();
    }
}
