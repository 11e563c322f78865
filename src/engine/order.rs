#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{engine::PositionSide, utils::record_id};

/// Represents the side of an order (buy or sell).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    /// Opens or increases a long position.
    Buy,
    /// Opens or increases a short position.
    Sell,
}

impl OrderSide {
    /// Returns the side of the position this order opens or increases.
    pub fn position_side(&self) -> PositionSide {
        match self {
            Self::Buy => PositionSide::Long,
            Self::Sell => PositionSide::Short,
        }
    }
}

/// Represents the outcome of a market order. Market orders resolve immediately.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// Executed at the requested price.
    Filled,
    /// Refused; no balance or position change.
    Rejected,
}

/// A market order request, before execution.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    /// Instrument symbol.
    pub symbol: String,
    /// Buy or sell.
    pub side: OrderSide,
    /// Quantity, must be positive.
    pub quantity: Decimal,
    /// Current market price, used as the fill price.
    pub price: Decimal,
    /// Stop-loss threshold of the resulting position.
    pub stop_loss: Option<Decimal>,
    /// Take-profit threshold of the resulting position.
    pub take_profit: Option<Decimal>,
    /// External chart tool to notify when the position closes.
    pub linked_tool_id: Option<String>,
}

impl<S: Into<String>> From<(S, OrderSide, Decimal, Decimal)> for OrderRequest {
    fn from((symbol, side, quantity, price): (S, OrderSide, Decimal, Decimal)) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            price,
            stop_loss: None,
            take_profit: None,
            linked_tool_id: None,
        }
    }
}

impl OrderRequest {
    /// Sets the stop-loss threshold of the resulting position.
    pub fn stop_loss(mut self, price: Decimal) -> Self {
        self.stop_loss = Some(price);
        self
    }

    /// Sets the take-profit threshold of the resulting position.
    pub fn take_profit(mut self, price: Decimal) -> Self {
        self.take_profit = Some(price);
        self
    }

    /// Links the resulting position to an external chart tool.
    pub fn linked_tool(mut self, tool_id: impl Into<String>) -> Self {
        self.linked_tool_id = Some(tool_id.into());
        self
    }

    /// Returns the total cost of the request (price * quantity), `None` on overflow.
    pub(crate) fn cost(&self) -> Option<Decimal> {
        self.price.checked_mul(self.quantity)
    }
}

/// Represents an executed or rejected market order. Immutable once recorded.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Order {
    id: String,
    symbol: String,
    side: OrderSide,
    quantity: Decimal,
    requested_price: Decimal,
    filled_price: Option<Decimal>,
    status: OrderStatus,
    filled_at: Option<DateTime<Utc>>,
    stop_loss: Option<Decimal>,
    take_profit: Option<Decimal>,
    linked_tool_id: Option<String>,
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Order {
    /// Records a request filled at its requested price.
    pub(crate) fn filled(request: &OrderRequest, filled_at: DateTime<Utc>) -> Self {
        Self {
            filled_price: Some(request.price),
            status: OrderStatus::Filled,
            filled_at: Some(filled_at),
            ..Self::rejected(request)
        }
    }

    /// Records a request that was refused.
    pub(crate) fn rejected(request: &OrderRequest) -> Self {
        Self {
            id: record_id("ord"),
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            requested_price: request.price,
            filled_price: None,
            status: OrderStatus::Rejected,
            filled_at: None,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            linked_tool_id: request.linked_tool_id.clone(),
        }
    }

    /// Returns the order id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the side.
    pub fn side(&self) -> OrderSide {
        self.side
    }

    /// Returns the requested quantity.
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// Returns the price the order was placed at.
    pub fn requested_price(&self) -> Decimal {
        self.requested_price
    }

    /// Returns the execution price, `None` for a rejected order.
    pub fn filled_price(&self) -> Option<Decimal> {
        self.filled_price
    }

    /// Returns whether the order was filled or rejected.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the execution time, `None` for a rejected order.
    pub fn filled_at(&self) -> Option<DateTime<Utc>> {
        self.filled_at
    }

    /// Returns the requested stop-loss threshold.
    pub fn stop_loss(&self) -> Option<Decimal> {
        self.stop_loss
    }

    /// Returns the requested take-profit threshold.
    pub fn take_profit(&self) -> Option<Decimal> {
        self.take_profit
    }

    /// Returns the linked chart tool, if any.
    pub fn linked_tool_id(&self) -> Option<&str> {
        self.linked_tool_id.as_deref()
    }

    /// Returns the filled notional (filled price * quantity), zero when rejected.
    pub fn cost(&self) -> Decimal {
        self.filled_price
            .map_or(Decimal::ZERO, |price| price.saturating_mul(self.quantity))
    }
}

#[cfg(test)]
use rust_decimal_macros::dec;

#[cfg(test)]
#[test]
fn create_simple_request() {
    let request: OrderRequest = ("AAPL", OrderSide::Buy, dec!(2), dec!(100)).into();

    assert_eq!(request.symbol, "AAPL");
    assert_eq!(request.quantity, dec!(2));
    assert_eq!(request.cost(), Some(dec!(200)));
    assert!(request.stop_loss.is_none());
    assert!(request.take_profit.is_none());
    assert!(request.linked_tool_id.is_none());
}

#[cfg(test)]
#[test]
fn create_request_with_exit_rules() {
    let request = OrderRequest::from(("AAPL", OrderSide::Sell, dec!(1.5), dec!(100)))
        .stop_loss(dec!(110))
        .take_profit(dec!(90))
        .linked_tool("tool-1");

    assert_eq!(request.cost(), Some(dec!(150)));
    assert_eq!(request.stop_loss, Some(dec!(110)));
    assert_eq!(request.take_profit, Some(dec!(90)));
    assert_eq!(request.linked_tool_id.as_deref(), Some("tool-1"));
}

#[cfg(test)]
#[test]
fn request_cost_overflow() {
    let request: OrderRequest = ("AAPL", OrderSide::Buy, Decimal::MAX, dec!(2)).into();
    assert_eq!(request.cost(), None);
}

#[cfg(test)]
#[test]
fn filled_order() {
    let request = OrderRequest::from(("AAPL", OrderSide::Buy, dec!(2.5), dec!(100))).linked_tool("tool-1");
    let now = Utc::now();
    let order = Order::filled(&request, now);

    assert_eq!(order.status(), OrderStatus::Filled);
    assert_eq!(order.filled_price(), Some(dec!(100)));
    assert_eq!(order.requested_price(), dec!(100));
    assert_eq!(order.filled_at(), Some(now));
    assert_eq!(order.cost(), dec!(250));
    assert_eq!(order.linked_tool_id(), Some("tool-1"));
    assert!(order.id().starts_with("ord-"));
}

#[cfg(test)]
#[test]
fn rejected_order() {
    let request: OrderRequest = ("AAPL", OrderSide::Buy, dec!(-1), dec!(100)).into();
    let order = Order::rejected(&request);

    assert_eq!(order.status(), OrderStatus::Rejected);
    assert!(order.filled_price().is_none());
    assert!(order.filled_at().is_none());
    assert_eq!(order.cost(), Decimal::ZERO);
}

#[cfg(test)]
#[test]
fn order_equality() {
    let request: OrderRequest = ("AAPL", OrderSide::Buy, dec!(1), dec!(100)).into();
    let order1 = Order::filled(&request, Utc::now());
    let order2 = Order::filled(&request, Utc::now());
    assert_ne!(order1, order2);
    assert_eq!(order1, order1.clone());
}

#[cfg(test)]
#[test]
fn side_mapping() {
    assert_eq!(OrderSide::Buy.position_side(), PositionSide::Long);
    assert_eq!(OrderSide::Sell.position_side(), PositionSide::Short);
}
