//! # PTS: Paper Trading Simulation engine
//!
//! **PTS** is a Rust library simulating a brokerage account for paper trading.
//! It fills market orders against prices supplied by the caller, tracks open and
//! closed positions, applies stop-loss/take-profit thresholds and reports every
//! completed trade to a journal.
//!
//! ## Core Components
//! | Component   | Description                                                                                     |
//! |-------------|-------------------------------------------------------------------------------------------------|
//! | **`Account`** | Cash balance, initial balance and realized P&L.                                               |
//! | **`Order`**  | Market orders, filled immediately at the supplied price or rejected.                          |
//! | **`Position`** | Open holdings per symbol (volume-weighted entry) and the closed history.                     |
//! | **`Trade`** | Journal record emitted once per closed position, tagged `paper-trade`.                         |
//! | **`Engine`** | The simulation engine owning the account, the positions and the order history.                |
//! | **`Metrics`** | Win rate, profit factor, drawdown and return of the closed trades.                           |
//!
//! ## Exit Rules
//! | Rule                     | Long                          | Short                          |
//! |--------------------------|-------------------------------|--------------------------------|
//! | **Stop-Loss**            | price <= stop                 | price >= stop                  |
//! | **Take-Profit**          | price >= target               | price <= target                |
//!
//! A triggered position fills at its threshold. When one price crosses both thresholds,
//! the stop-loss fires.
//!
//! ## Getting Started
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::mpsc::channel;
//!
//! use pts_rs::prelude::*;
//! use rust_decimal::Decimal;
//!
//! let (journal, trades) = channel();
//! let mut engine = Engine::new(Decimal::from(10_000)).unwrap().with_listener(journal);
//!
//! // Buy 10 AAPL at $100 with a stop at $95
//! let request = OrderRequest::from(("AAPL", OrderSide::Buy, Decimal::from(10), Decimal::from(100)))
//!     .stop_loss(Decimal::from(95));
//! engine.place_market_order(request).unwrap();
//! assert_eq!(engine.balance(), Decimal::from(9_000));
//!
//! // Mark to market
//! let prices = HashMap::from([("AAPL".to_string(), Decimal::from(104))]);
//! assert_eq!(engine.equity(&prices), Decimal::from(9_040));
//!
//! // The price falls through the stop
//! engine.check_stop_loss_take_profit("AAPL", Decimal::from(94)).unwrap();
//! assert_eq!(engine.balance(), Decimal::from(9_950));
//!
//! match trades.try_recv().unwrap() {
//!     EngineEvent::TradeClosed(trade) => assert!(trade.notes.contains("LOSS")),
//!     EngineEvent::ToolClosed { .. } => unreachable!(),
//! }
//! ```
//!
//! ## Error Handling
//! PTS uses custom error types to handle:
//! - Invalid quantities, prices and amounts.
//! - Insufficient funds.
//! - Unknown positions and opposite side orders.
//! - Amounts too large for a `Decimal`, refused before any state change.
//!
//! Closing a position that is already closed is not an error: it returns `Ok(None)`.
//!
//! ## License
//! MIT
#![warn(missing_docs)]

/// Core simulation components: account, orders, positions, trades and the engine.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Utility functions and helpers.
mod utils;

/// Performance metrics: win rate, profit factor, drawdown, etc.
#[cfg(feature = "metrics")]
pub mod metrics;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::engine::*;
    pub use crate::errors::*;

    #[cfg(feature = "metrics")]
    pub use crate::metrics::*;
}

use std::ops::{Add, Div, Mul, Sub};

use rust_decimal::Decimal;

/// Trait for performing percentage-based calculations.
///
/// This trait provides methods to add, subtract, and calculate percentages
/// for numeric types, enabling common financial calculations.
pub trait PercentCalculus<Rhs = Self> {
    /// Adds a percentage to the value.
    ///
    /// ### Arguments
    /// * `rhs` - The percentage to add (e.g., 10 for 10%).
    ///
    /// ### Returns
    /// The value increased by the given percentage.
    fn addpercent(self, rhs: Rhs) -> Self;

    /// Subtracts a percentage from the value.
    ///
    /// ### Arguments
    /// * `rhs` - The percentage to subtract (e.g., 10 for 10%).
    ///
    /// ### Returns
    /// The value decreased by the given percentage.
    fn subpercent(self, rhs: Rhs) -> Self;

    /// Calculates the absolute value of a percentage.
    ///
    /// ### Arguments
    /// * `percent` - The percentage to calculate (e.g., 10 for 10%).
    ///
    /// ### Returns
    /// The absolute value of the given percentage.
    fn how_many(self, percent: Self) -> Self;

    /// Calculates the percentage change between two values.
    ///
    /// ### Arguments
    /// * `new` - The new value to compare with.
    ///
    /// ### Returns
    /// The percentage change from the original value to the new value, zero from a zero origin.
    fn change(self, new: Self) -> Self;
}

impl PercentCalculus for Decimal {
    fn addpercent(self, percent: Self) -> Self {
        self.add(self.mul(percent.div(Decimal::ONE_HUNDRED)))
    }

    fn subpercent(self, percent: Self) -> Self {
        self.sub(self.mul(percent.div(Decimal::ONE_HUNDRED)))
    }

    fn how_many(self, percent: Self) -> Self {
        percent.mul(self.div(Decimal::ONE_HUNDRED))
    }

    fn change(self, new: Self) -> Self {
        if self.is_zero() {
            return Decimal::ZERO;
        }
        new.sub(self).div(self).mul(Decimal::ONE_HUNDRED)
    }
}
