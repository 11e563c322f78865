#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    engine::OrderRequest,
    errors::{Error, Result},
    utils::record_id,
};

/// Represents the side of a position (long or short).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    /// Profits when the price rises.
    Long,
    /// Profits when the price falls.
    Short,
}

impl PositionSide {
    /// Lowercase label used in journal tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

/// A risk threshold crossed by a price sample, with the price the position fills at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The stop-loss threshold was crossed.
    StopLoss(Decimal),
    /// The take-profit threshold was crossed.
    TakeProfit(Decimal),
}

impl Trigger {
    /// Returns the threshold price.
    pub fn price(&self) -> Decimal {
        match self {
            Self::StopLoss(price) | Self::TakeProfit(price) => *price,
        }
    }
}

/// Represents an open or closed holding in one symbol.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Position {
    id: String,
    symbol: String,
    side: PositionSide,
    quantity: Decimal,
    // Volume-weighted average of every fill merged into this position
    entry_price: Decimal,
    stop_loss: Option<Decimal>,
    take_profit: Option<Decimal>,
    linked_tool_id: Option<String>,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    exit_price: Option<Decimal>,
    realized_pnl: Option<Decimal>,
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Position {
    /// Creates an open position.
    pub fn new(
        symbol: impl Into<String>,
        side: PositionSide,
        quantity: Decimal,
        entry_price: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: record_id("pos"),
            symbol: symbol.into(),
            side,
            quantity,
            entry_price,
            stop_loss: None,
            take_profit: None,
            linked_tool_id: None,
            opened_at,
            closed_at: None,
            exit_price: None,
            realized_pnl: None,
        }
    }

    /// Opens a position from a filled request.
    pub(crate) fn open(request: &OrderRequest, opened_at: DateTime<Utc>) -> Self {
        let mut position = Self::new(
            request.symbol.clone(),
            request.side.position_side(),
            request.quantity,
            request.price,
            opened_at,
        );
        position.stop_loss = request.stop_loss;
        position.take_profit = request.take_profit;
        position.linked_tool_id = request.linked_tool_id.clone();
        position
    }

    /// Sets the stop-loss threshold.
    pub fn with_stop_loss(mut self, price: Decimal) -> Self {
        self.stop_loss = Some(price);
        self
    }

    /// Sets the take-profit threshold.
    pub fn with_take_profit(mut self, price: Decimal) -> Self {
        self.take_profit = Some(price);
        self
    }

    /// Links the position to an external chart tool.
    pub fn with_linked_tool(mut self, tool_id: impl Into<String>) -> Self {
        self.linked_tool_id = Some(tool_id.into());
        self
    }

    /// Consumes the position and returns it closed at `exit_price`.
    ///
    /// ### Arguments
    /// * `exit_price` - The price at which the whole quantity leaves the market.
    /// * `closed_at` - Moment of the close.
    ///
    /// ### Returns
    /// The closed position, with its realized P&L set.
    pub fn into_closed(mut self, exit_price: Decimal, closed_at: DateTime<Utc>) -> Self {
        self.realized_pnl = Some(self.estimate_pnl(exit_price));
        self.exit_price = Some(exit_price);
        self.closed_at = Some(closed_at);
        self
    }

    /// Returns the position id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the side.
    pub fn side(&self) -> PositionSide {
        self.side
    }

    /// Returns the held quantity.
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// Returns the volume-weighted entry price.
    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    /// Returns the stop-loss threshold.
    pub fn stop_loss(&self) -> Option<Decimal> {
        self.stop_loss
    }

    /// Returns the take-profit threshold.
    pub fn take_profit(&self) -> Option<Decimal> {
        self.take_profit
    }

    /// Returns the linked chart tool, if any.
    pub fn linked_tool_id(&self) -> Option<&str> {
        self.linked_tool_id.as_deref()
    }

    /// Returns the opening time.
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Returns the closing time, `None` while open.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Returns the exit price, `None` while open.
    pub fn exit_price(&self) -> Option<Decimal> {
        self.exit_price
    }

    /// Returns the booked profit/loss, `None` while the position is open.
    pub fn realized_pnl(&self) -> Option<Decimal> {
        self.realized_pnl
    }

    /// Returns `true` until the position is closed.
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Returns the capital committed to the position (entry price * quantity).
    pub fn cost(&self) -> Decimal {
        self.entry_price.saturating_mul(self.quantity)
    }

    /// Estimates the profit/loss of the position if it closed at `price`.
    /// Saturates at the `Decimal` bounds.
    pub fn estimate_pnl(&self, price: Decimal) -> Decimal {
        self.price_move(price).saturating_mul(self.quantity)
    }

    /// Profit/loss at `price`, `None` when it does not fit in a `Decimal`.
    pub(crate) fn checked_pnl(&self, price: Decimal) -> Option<Decimal> {
        self.price_move(price).checked_mul(self.quantity)
    }

    // Per-unit gain of a move to `price`; both prices are positive, no overflow
    fn price_move(&self, price: Decimal) -> Decimal {
        match self.side {
            PositionSide::Long => price - self.entry_price,
            PositionSide::Short => self.entry_price - price,
        }
    }

    /// Returns the threshold crossed by `price`, if any.
    ///
    /// Stop-loss is checked first: when a single sample crosses both thresholds,
    /// the stop-loss fires.
    pub fn trigger(&self, price: Decimal) -> Option<Trigger> {
        let stop_hit = self.stop_loss.filter(|&stop_loss| match self.side {
            PositionSide::Long => price <= stop_loss,
            PositionSide::Short => price >= stop_loss,
        });
        if let Some(stop_loss) = stop_hit {
            return Some(Trigger::StopLoss(stop_loss));
        }

        self.take_profit
            .filter(|&take_profit| match self.side {
                PositionSide::Long => price >= take_profit,
                PositionSide::Short => price <= take_profit,
            })
            .map(Trigger::TakeProfit)
    }

    /// Returns the quantity and volume-weighted entry price after merging `request`,
    /// `None` on overflow.
    pub(crate) fn merged(&self, request: &OrderRequest) -> Option<(Decimal, Decimal)> {
        let quantity = self.quantity.checked_add(request.quantity)?;
        let notional = self
            .quantity
            .checked_mul(self.entry_price)?
            .checked_add(request.quantity.checked_mul(request.price)?)?;
        Some((quantity, notional.checked_div(quantity)?))
    }

    /// Merges a same-side fill into the position.
    /// The entry price becomes the volume-weighted average; supplied thresholds replace the current ones.
    /// The position is unchanged when the average overflows.
    pub(crate) fn merge(&mut self, request: &OrderRequest) -> Result<()> {
        let (quantity, entry_price) = self.merged(request).ok_or(Error::Overflow("average entry price"))?;
        self.entry_price = entry_price;
        self.quantity = quantity;
        if request.stop_loss.is_some() {
            self.stop_loss = request.stop_loss;
        }
        if request.take_profit.is_some() {
            self.take_profit = request.take_profit;
        }
        if request.linked_tool_id.is_some() {
            self.linked_tool_id = request.linked_tool_id.clone();
        }
        Ok(())
    }

    pub(crate) fn set_stop_loss(&mut self, price: Option<Decimal>) {
        self.stop_loss = price;
    }

    pub(crate) fn set_take_profit(&mut self, price: Option<Decimal>) {
        self.take_profit = price;
    }
}
