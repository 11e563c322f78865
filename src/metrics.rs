//! Performance metrics for paper trading.
//!
//! This module provides tools to calculate, from the closed positions:
//! - Max drawdown of the realized balance
//! - Profit factor
//! - Win rate
//! - Return on the initial balance
//!
//! It needs to enable `metrics` feature to use it.

use std::fmt;

use rust_decimal::Decimal;

use crate::{PercentCalculus, engine::*};

/// A collection of trading metrics calculated from the closed positions.
///
/// `Metrics` is typically constructed from an `Engine`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metrics {
    balance: Decimal,
    realized_pnl: Decimal,
    initial_balance: Decimal,
    // Realized P&L of each closed position, in closing order
    pnls: Vec<Decimal>,
}

impl From<&Engine> for Metrics {
    fn from(value: &Engine) -> Self {
        Self {
            balance: value.balance(),
            realized_pnl: value.realized_pnl(),
            initial_balance: value.initial_balance(),
            pnls: value.closed_positions().filter_map(Position::realized_pnl).collect(),
        }
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance from the realized P&L of each closed position.
    pub fn new(pnls: Vec<Decimal>, initial_balance: Decimal, balance: Decimal) -> Self {
        Self {
            realized_pnl: pnls.iter().sum(),
            pnls,
            balance,
            initial_balance,
        }
    }

    /// Returns the initial balance.
    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    /// Returns the balance.
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Returns the realized profits and losses.
    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Returns the number of closed trades.
    pub fn trades(&self) -> usize {
        self.pnls.len()
    }

    /// Computes the return of the realized P&L on the initial balance, as a percentage.
    pub fn return_pct(&self) -> Decimal {
        self.initial_balance.change(self.initial_balance + self.realized_pnl)
    }

    /// Computes the maximum drawdown of the realized balance as a percentage.
    pub fn max_drawdown(&self) -> Decimal {
        let mut realized = self.initial_balance;
        let mut max_peak = self.initial_balance;
        let mut max_drawdown = Decimal::ZERO;

        for pnl in &self.pnls {
            realized += pnl;
            if realized > max_peak {
                max_peak = realized;
            }
            if max_peak.is_zero() {
                continue;
            }
            let drawdown = (max_peak - realized) / max_peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown * Decimal::ONE_HUNDRED
    }

    /// Computes the profit factor, `None` when there is no loss.
    pub fn profit_factor(&self) -> Option<Decimal> {
        let total_gains = self.pnls.iter().filter(|p| p.is_sign_positive()).sum::<Decimal>();
        let total_losses = self.pnls.iter().filter(|p| p.is_sign_negative()).map(|p| p.abs()).sum::<Decimal>();

        if total_losses.is_zero() {
            return None;
        }

        Some(total_gains / total_losses)
    }

    /// Computes the win rate as a percentage of winning trades.
    pub fn win_rate(&self) -> Decimal {
        if self.pnls.is_empty() {
            return Decimal::ZERO;
        }

        let winning_trades = self.pnls.iter().filter(|p| **p > Decimal::ZERO).count();
        Decimal::from(winning_trades) / Decimal::from(self.pnls.len()) * Decimal::ONE_HUNDRED
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Paper Trading Metrics ===")?;
        writeln!(f, "Initial Balance: {:.2}", self.initial_balance)?;
        writeln!(f, "Balance: {:.2}", self.balance)?;
        writeln!(f, "Realized P&L: {:.2} ({:.2}%)", self.realized_pnl, self.return_pct())?;
        writeln!(f, "Trades: {}", self.trades())?;
        #[allow(clippy::writeln_empty_string)]
        writeln!(f, "")?;
        writeln!(f, "Max Drawdown: {:.2}%", self.max_drawdown())?;
        match self.profit_factor() {
            Some(profit_factor) => writeln!(f, "Profit Factor: {profit_factor:.2}")?,
            None => writeln!(f, "Profit Factor: n/a (no losses)")?,
        }
        writeln!(f, "Win Rate: {:.2}%", self.win_rate())
    }
}

#[cfg(test)]
use rust_decimal_macros::dec;

#[cfg(test)]
#[test]
fn max_drawdown() {
    // 10000 -> 12000 -> 9000 -> 11000
    let metrics = Metrics::new(vec![dec!(2000), dec!(-3000), dec!(2000)], dec!(10000), dec!(11000));
    assert_eq!(metrics.max_drawdown(), dec!(25)); // (12000 - 9000) / 12000 = 25%
}

#[cfg(test)]
#[test]
fn max_drawdown_no_trades() {
    let metrics = Metrics::new(vec![], dec!(10000), dec!(10000));
    assert_eq!(metrics.max_drawdown(), Decimal::ZERO);
}

#[cfg(test)]
#[test]
fn profit_factor() {
    let metrics = Metrics::new(vec![dec!(20), dec!(-10)], dec!(10000), dec!(10010));
    assert_eq!(metrics.profit_factor(), Some(dec!(2))); // 20 / 10 = 2.0
}

#[cfg(test)]
#[test]
fn profit_factor_no_losses() {
    let metrics = Metrics::new(vec![dec!(20)], dec!(10000), dec!(10020));
    assert_eq!(metrics.profit_factor(), None);
}

#[cfg(test)]
#[test]
fn win_rate() {
    let metrics = Metrics::new(vec![dec!(20), dec!(-10)], dec!(10000), dec!(10010));
    assert_eq!(metrics.win_rate(), dec!(50));
}

#[cfg(test)]
#[test]
fn win_rate_no_trades() {
    let metrics = Metrics::new(vec![], dec!(10000), dec!(10000));
    assert_eq!(metrics.win_rate(), Decimal::ZERO);
}

#[cfg(test)]
#[test]
fn from_engine() {
    let mut engine = Engine::new(dec!(10000)).unwrap();
    engine
        .place_market_order(OrderRequest::from(("AAPL", OrderSide::Buy, dec!(10), dec!(100))))
        .unwrap();
    let id = engine.position_by_symbol("AAPL").unwrap().id().to_owned();
    engine.close_position(&id, dec!(120)).unwrap();

    let metrics = Metrics::from(&engine);
    assert_eq!(metrics.trades(), 1);
    assert_eq!(metrics.realized_pnl(), dec!(200));
    assert_eq!(metrics.return_pct(), dec!(2));
    assert_eq!(metrics.win_rate(), dec!(100));
    assert!(metrics.to_string().contains("Win Rate: 100.00%"));
}
