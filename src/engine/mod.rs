//! Core simulation engine components.
//!
//! This module provides the fundamental types for paper trading:
//! - `Account`: Cash balance, initial balance and realized P&L.
//! - `Order`: Market orders, filled or rejected on placement.
//! - `Position`: Open and closed holdings with stop-loss/take-profit thresholds.
//! - `Trade`: Journal records emitted when positions close.
//! - `Engine`: The simulation engine owning all of the above.

mod account;
mod book;
mod feed;
mod order;
mod position;
mod sizing;
mod snapshot;
mod trade;

#[cfg(test)]
mod scenarios;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::errors::{Error, Result};

pub use account::*;
pub use book::PositionBook;
pub use feed::*;
pub use order::*;
pub use position::*;
pub use sizing::*;
pub use snapshot::*;
pub use trade::*;

use book::Lookup;

/// Paper trading simulation engine.
///
/// Owns the account, the position book and the order history. Every operation is
/// synchronous; the host serializes calls (one owner, `&mut` access).
pub struct Engine {
    account: Account,
    book: PositionBook,
    orders: Vec<Order>,
    listeners: Vec<Box<dyn TradeListener>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("account", &self.account)
            .field("book", &self.book)
            .field("orders", &self.orders)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl std::ops::Deref for Engine {
    type Target = Account;

    fn deref(&self) -> &Self::Target {
        &self.account
    }
}

impl Engine {
    /// Creates a new engine with a fresh account.
    ///
    /// ### Arguments
    /// * `initial_balance` - Starting cash balance, must be positive.
    ///
    /// ### Returns
    /// The new engine or an error.
    ///
    /// ### Example
    /// ```rust
    /// use pts_rs::prelude::*;
    /// use rust_decimal::Decimal;
    ///
    /// let engine = Engine::new(Decimal::from(10_000)).unwrap();
    /// assert_eq!(engine.balance(), Decimal::from(10_000));
    /// ```
    pub fn new(initial_balance: Decimal) -> Result<Self> {
        Ok(Self::from_account(Account::new(initial_balance)?))
    }

    /// Creates an engine around an existing account, with an empty book.
    pub fn from_account(account: Account) -> Self {
        Self {
            account,
            book: PositionBook::default(),
            orders: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Rebuilds an engine from persisted records.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut engine = Self::from_account(snapshot.account);
        engine.restore_positions(snapshot.positions);
        engine
    }

    /// Registers a close listener (journal, chart tools, channel...).
    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: TradeListener + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Builder form of [`Engine::add_listener`].
    pub fn with_listener<L>(mut self, listener: L) -> Self
    where
        L: TradeListener + 'static,
    {
        self.add_listener(listener);
        self
    }

    /// Returns the account.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Returns the position book.
    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    /// Returns an iterator over the open positions.
    pub fn positions(&self) -> std::collections::btree_map::Values<'_, String, Position> {
        self.book.open()
    }

    /// Returns an iterator over the closed positions.
    pub fn closed_positions(&self) -> std::slice::Iter<'_, Position> {
        self.book.closed()
    }

    /// Returns an iterator over the order history, filled and rejected.
    pub fn orders(&self) -> std::slice::Iter<'_, Order> {
        self.orders.iter()
    }

    /// Returns the open position for `symbol`, if any.
    pub fn position_by_symbol(&self, symbol: &str) -> Option<&Position> {
        self.book.get_by_symbol(symbol)
    }

    /// Returns the open position carrying `id`, if any.
    pub fn position(&self, id: &str) -> Option<&Position> {
        self.book.get(id)
    }

    /// Adds funds to the account and returns the new balance.
    pub fn deposit(&mut self, amount: Decimal) -> Result<Decimal> {
        let balance = self.account.deposit(amount)?;
        debug!(%amount, %balance, "deposit");
        Ok(balance)
    }

    /// Removes funds from the account and returns the new balance.
    ///
    /// Fails with `InsufficientFunds`, leaving the balance unchanged, when `amount` exceeds it.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<Decimal> {
        match self.account.withdraw(amount) {
            Ok(balance) => {
                debug!(%amount, %balance, "withdrawal");
                Ok(balance)
            }
            Err(err) => {
                warn!(%amount, error = %err, "withdrawal rejected");
                Err(err)
            }
        }
    }

    /// Resets the account to `balance` (default: the initial balance) and clears every position.
    ///
    /// The order history is kept.
    pub fn reset(&mut self, balance: Option<Decimal>) -> Result<()> {
        self.account.reset(balance)?;
        self.book.clear();
        info!(balance = %self.account.balance(), "engine reset");
        Ok(())
    }

    /// Mark-to-market profit/loss of the open positions. Unquoted symbols count as zero.
    pub fn unrealized_pnl<P>(&self, prices: &P) -> Decimal
    where
        P: PriceFeed + ?Sized,
    {
        self.book.unrealized_pnl(|symbol| prices.price(symbol))
    }

    /// Balance plus unrealized profit/loss.
    pub fn equity<P>(&self, prices: &P) -> Decimal
    where
        P: PriceFeed + ?Sized,
    {
        self.account.balance().saturating_add(self.unrealized_pnl(prices))
    }

    /// Places a market order, filled immediately at the requested price.
    ///
    /// ### Arguments
    /// * `request` - Symbol, side, quantity, current price and optional exit rules.
    ///
    /// ### Returns
    /// The filled order, or an error. A refused request is recorded in the order
    /// history as rejected and leaves the balance and the book untouched.
    ///
    /// ### Example
    /// ```rust
    /// use pts_rs::prelude::*;
    /// use rust_decimal::Decimal;
    ///
    /// let mut engine = Engine::new(Decimal::from(10_000)).unwrap();
    /// let request = OrderRequest::from(("AAPL", OrderSide::Buy, Decimal::from(10), Decimal::from(100)))
    ///     .stop_loss(Decimal::from(95));
    /// let order = engine.place_market_order(request).unwrap();
    ///
    /// assert_eq!(order.status(), OrderStatus::Filled);
    /// assert_eq!(engine.balance(), Decimal::from(9_000));
    /// ```
    pub fn place_market_order(&mut self, request: impl Into<OrderRequest>) -> Result<Order> {
        let request = request.into();
        let cost = match self.check_request(&request) {
            Ok(cost) => cost,
            Err(err) => {
                warn!(symbol = %request.symbol, side = ?request.side, error = %err, "order rejected");
                self.orders.push(Order::rejected(&request));
                return Err(err);
            }
        };

        let filled_at = Utc::now();
        self.account.debit(cost)?;
        let position = self.book.open_or_increase(&request, filled_at)?;
        let order = Order::filled(&request, filled_at);
        self.orders.push(order.clone());
        debug!(
            order = order.id(),
            position = position.id(),
            symbol = %request.symbol,
            quantity = %position.quantity(),
            entry_price = %position.entry_price(),
            "order filled"
        );
        Ok(order)
    }

    // Returns the cost of an acceptable request
    fn check_request(&self, request: &OrderRequest) -> Result<Decimal> {
        if request.quantity <= Decimal::ZERO {
            return Err(Error::InvalidQuantity(request.quantity));
        }
        for price in [Some(request.price), request.stop_loss, request.take_profit]
            .into_iter()
            .flatten()
        {
            if price <= Decimal::ZERO {
                return Err(Error::InvalidPrice(price));
            }
        }
        self.book.validate(request)?;
        let cost = request.cost().ok_or(Error::Overflow("order cost"))?;
        if cost > self.account.balance() {
            return Err(Error::InsufficientFunds(cost, self.account.balance()));
        }
        Ok(cost)
    }

    /// Closes an open position at `exit_price`.
    ///
    /// ### Arguments
    /// * `id` - Id of the position to close.
    /// * `exit_price` - The price at which to close the position.
    ///
    /// ### Returns
    /// The closed position; `None` when it was already closed (a duplicate close is a no-op);
    /// `PositionNotFound` when no position ever carried this id.
    pub fn close_position(&mut self, id: &str, exit_price: Decimal) -> Result<Option<Position>> {
        self.close_with(id, exit_price, CloseReason::Manual)
    }

    fn close_with(&mut self, id: &str, exit_price: Decimal, reason: CloseReason) -> Result<Option<Position>> {
        match self.book.lookup(id) {
            Lookup::Open => {}
            Lookup::Closed => {
                warn!(position = id, "position already closed");
                return Ok(None);
            }
            Lookup::Unknown => return Err(Error::PositionNotFound(id.to_owned())),
        }
        if exit_price <= Decimal::ZERO {
            return Err(Error::InvalidPrice(exit_price));
        }

        let (cost, pnl) = {
            let position = self
                .book
                .get(id)
                .ok_or_else(|| Error::PositionNotFound(id.to_owned()))?;
            let pnl = position.checked_pnl(exit_price).ok_or(Error::Overflow("realized P&L"))?;
            (position.cost(), pnl)
        };
        let balance = self.account.settle(cost, pnl)?;
        let position = self
            .book
            .take(id)
            .ok_or_else(|| Error::PositionNotFound(id.to_owned()))?;
        let closed = position.into_closed(exit_price, Utc::now());
        self.book.archive(closed.clone());
        info!(
            position = closed.id(),
            symbol = closed.symbol(),
            reason = ?reason,
            %exit_price,
            %pnl,
            %balance,
            "position closed"
        );

        self.emit(&closed, reason);
        Ok(Some(closed))
    }

    fn emit(&mut self, position: &Position, reason: CloseReason) {
        if let Some(trade) = Trade::from_closed(position, reason) {
            for listener in self.listeners.iter_mut() {
                listener.on_trade_closed(&trade);
            }
        }
        if let Some(tool_id) = position.linked_tool_id() {
            for listener in self.listeners.iter_mut() {
                listener.on_position_closed(position.id(), tool_id);
            }
        }
    }

    /// Closes every open position quoted by `prices`; unquoted ones stay open.
    ///
    /// ### Returns
    /// The closed positions, or `InvalidPrice` (before anything is closed) when a quote is not positive.
    pub fn close_all<P>(&mut self, prices: &P) -> Result<Vec<Position>>
    where
        P: PriceFeed + ?Sized,
    {
        let targets = self
            .book
            .open_ids()
            .into_iter()
            .filter_map(|(id, symbol)| prices.price(&symbol).map(|price| (id, price)))
            .collect::<Vec<_>>();
        if let Some((_, price)) = targets.iter().find(|(_, price)| *price <= Decimal::ZERO) {
            return Err(Error::InvalidPrice(*price));
        }

        let mut closed = Vec::with_capacity(targets.len());
        for (id, price) in targets {
            closed.extend(self.close_with(&id, price, CloseReason::CloseAll)?);
        }
        Ok(closed)
    }

    /// Evaluates the stop-loss/take-profit of the open position for `symbol` against `price`.
    ///
    /// A triggered position closes at its threshold price through the same path as a
    /// manual close. When both thresholds are crossed, the stop-loss fires.
    ///
    /// ### Returns
    /// The closed position, `None` when nothing triggered, or `InvalidPrice` when the sample is not positive.
    pub fn check_stop_loss_take_profit(&mut self, symbol: &str, price: Decimal) -> Result<Option<Position>> {
        if price <= Decimal::ZERO {
            return Err(Error::InvalidPrice(price));
        }
        let Some(position) = self.book.get_by_symbol(symbol) else {
            return Ok(None);
        };
        let Some(trigger) = position.trigger(price) else {
            return Ok(None);
        };

        let id = position.id().to_owned();
        let reason = match trigger {
            Trigger::StopLoss(_) => CloseReason::StopLoss,
            Trigger::TakeProfit(_) => CloseReason::TakeProfit,
        };
        debug!(position = %id, %price, ?trigger, "threshold crossed");
        self.close_with(&id, trigger.price(), reason)
    }

    /// Runs the stop-loss/take-profit evaluation for every open position quoted by `prices`.
    ///
    /// Fails with `InvalidPrice`, before anything is closed, when a quote is not positive.
    pub fn check_all<P>(&mut self, prices: &P) -> Result<Vec<Position>>
    where
        P: PriceFeed + ?Sized,
    {
        let quotes = self
            .book
            .open_ids()
            .into_iter()
            .filter_map(|(_, symbol)| prices.price(&symbol).map(|price| (symbol, price)))
            .collect::<Vec<_>>();
        if let Some((_, price)) = quotes.iter().find(|(_, price)| *price <= Decimal::ZERO) {
            return Err(Error::InvalidPrice(*price));
        }

        let mut closed = Vec::new();
        for (symbol, price) in quotes {
            closed.extend(self.check_stop_loss_take_profit(&symbol, price)?);
        }
        Ok(closed)
    }

    /// Replaces the stop-loss of an open position; `None` removes it.
    ///
    /// Returns `false`, changing nothing, for unknown or closed positions and non-positive prices.
    pub fn update_stop_loss(&mut self, id: &str, stop_loss: Option<Decimal>) -> bool {
        if stop_loss.is_some_and(|price| price <= Decimal::ZERO) {
            return false;
        }
        self.book.update(id, |position| position.set_stop_loss(stop_loss))
    }

    /// Replaces the take-profit of an open position; `None` removes it.
    ///
    /// Returns `false`, changing nothing, for unknown or closed positions and non-positive prices.
    pub fn update_take_profit(&mut self, id: &str, take_profit: Option<Decimal>) -> bool {
        if take_profit.is_some_and(|price| price <= Decimal::ZERO) {
            return false;
        }
        self.book.update(id, |position| position.set_take_profit(take_profit))
    }

    /// Sizes a position against the current balance. See [`position_size`].
    pub fn position_size_for(&self, risk_percent: Decimal, entry_price: Decimal, stop_loss_price: Decimal) -> Decimal {
        position_size(self.account.balance(), risk_percent, entry_price, stop_loss_price)
    }

    /// Replaces the account with a persisted one.
    pub fn restore_account(&mut self, account: Account) {
        info!(account = account.id(), balance = %account.balance(), "account restored");
        self.account = account;
    }

    /// Replaces the book with persisted positions; those with a close time go to the history.
    pub fn restore_positions(&mut self, positions: Vec<Position>) {
        self.book.restore(positions);
        info!(
            open = self.book.open().count(),
            closed = self.book.closed().count(),
            "positions restored"
        );
    }

    /// Copies the account and every position, open then closed, for persistence.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            account: self.account.clone(),
            positions: self.book.open().chain(self.book.closed()).cloned().collect(),
        }
    }
}
