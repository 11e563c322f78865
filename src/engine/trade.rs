#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::sync::mpsc::Sender;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    engine::{Position, PositionSide},
    utils::record_id,
};

/// Tag carried by every journal record produced by the engine.
pub const PAPER_TRADE_TAG: &str = "paper-trade";

/// What closed a position.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed by the caller.
    Manual,
    /// The stop-loss threshold was crossed.
    StopLoss,
    /// The take-profit threshold was crossed.
    TakeProfit,
    /// Closed by a close-all sweep.
    CloseAll,
}

impl CloseReason {
    /// Journal tag for automatic closes.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::StopLoss => Some("stop-loss"),
            Self::TakeProfit => Some("take-profit"),
            Self::Manual | Self::CloseAll => None,
        }
    }
}

/// Journal record emitted once per closed position.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    /// Trade id.
    pub id: String,
    /// Id of the closed position.
    pub position_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Long or short.
    pub side: PositionSide,
    /// Closed quantity.
    pub quantity: Decimal,
    /// Volume-weighted entry price.
    pub entry_price: Decimal,
    /// Fill price of the close.
    pub exit_price: Decimal,
    /// Opening time of the position.
    pub entry_date: DateTime<Utc>,
    /// Closing time of the position.
    pub exit_date: DateTime<Utc>,
    /// Booked profit/loss.
    pub realized_pnl: Decimal,
    /// What closed the position.
    pub reason: CloseReason,
    /// Human readable summary, `WIN` or `LOSS`.
    pub notes: String,
    /// Always contains `paper-trade`.
    pub tags: Vec<String>,
}

impl Trade {
    /// Builds the journal record of a closed position.
    /// Returns `None` while the position is still open.
    pub fn from_closed(position: &Position, reason: CloseReason) -> Option<Self> {
        let exit_price = position.exit_price()?;
        let exit_date = position.closed_at()?;
        let realized_pnl = position.realized_pnl()?;

        // a break-even close is not a win
        let outcome = if realized_pnl > Decimal::ZERO { "WIN" } else { "LOSS" };
        let notes = format!(
            "Paper trade {outcome}: {} {} {} @ {:.2} -> {:.2}, P&L {:.2}",
            position.side().as_str(),
            position.quantity(),
            position.symbol(),
            position.entry_price(),
            exit_price,
            realized_pnl,
        );

        let mut tags = vec![PAPER_TRADE_TAG.to_owned(), position.side().as_str().to_owned()];
        tags.extend(reason.tag().map(str::to_owned));

        Some(Self {
            id: record_id("trd"),
            position_id: position.id().to_owned(),
            symbol: position.symbol().to_owned(),
            side: position.side(),
            quantity: position.quantity(),
            entry_price: position.entry_price(),
            exit_price,
            entry_date: position.opened_at(),
            exit_date,
            realized_pnl,
            reason,
            notes,
            tags,
        })
    }

    /// Returns `true` for a strictly positive P&L.
    pub fn is_win(&self) -> bool {
        self.realized_pnl > Decimal::ZERO
    }
}

/// Observer of close events.
///
/// Both callbacks run synchronously inside the close path, before it returns:
/// first `on_trade_closed`, then `on_position_closed` when the position was linked to a chart tool.
pub trait TradeListener {
    /// Receives the journal record of a closed position.
    fn on_trade_closed(&mut self, trade: &Trade);

    /// Receives the id of a closed position and the chart tool it was linked to.
    fn on_position_closed(&mut self, _position_id: &str, _linked_tool_id: &str) {}
}

/// Close events, for hosts consuming them through a channel.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A position closed and was journaled.
    TradeClosed(Trade),
    /// A closed position was linked to a chart tool.
    ToolClosed {
        /// Closed position.
        position_id: String,
        /// Chart tool linked to the position.
        linked_tool_id: String,
    },
}

impl TradeListener for Sender<EngineEvent> {
    fn on_trade_closed(&mut self, trade: &Trade) {
        // a dropped receiver only means nobody listens anymore
        let _ = self.send(EngineEvent::TradeClosed(trade.clone()));
    }

    fn on_position_closed(&mut self, position_id: &str, linked_tool_id: &str) {
        let _ = self.send(EngineEvent::ToolClosed {
            position_id: position_id.to_owned(),
            linked_tool_id: linked_tool_id.to_owned(),
        });
    }
}
