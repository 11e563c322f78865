use std::{
    collections::{BTreeMap, HashMap},
    sync::mpsc::{Receiver, channel},
};

use crate::PercentCalculus;
use crate::engine::*;
use crate::errors::Error;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn get_engine(balance: Decimal) -> (Engine, Receiver<EngineEvent>) {
    let (tx, rx) = channel();
    let engine = Engine::new(balance).unwrap().with_listener(tx);
    (engine, rx)
}

fn prices(quotes: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
    quotes.iter().map(|(s, p)| (s.to_string(), *p)).collect()
}

fn trades(rx: &Receiver<EngineEvent>) -> Vec<Trade> {
    rx.try_iter()
        .filter_map(|event| match event {
            EngineEvent::TradeClosed(trade) => Some(trade),
            EngineEvent::ToolClosed { .. } => None,
        })
        .collect()
}

fn buy(symbol: &str, quantity: Decimal, price: Decimal) -> OrderRequest {
    (symbol, OrderSide::Buy, quantity, price).into()
}

fn sell(symbol: &str, quantity: Decimal, price: Decimal) -> OrderRequest {
    (symbol, OrderSide::Sell, quantity, price).into()
}

#[test]
fn scenario_open_and_close_long_with_profit() {
    let (mut engine, rx) = get_engine(dec!(10000));

    let order = engine.place_market_order(buy("AAPL", dec!(10), dec!(100))).unwrap();
    assert_eq!(order.status(), OrderStatus::Filled);
    assert_eq!(order.filled_price(), Some(dec!(100)));
    assert_eq!(engine.balance(), dec!(9000));

    let id = engine.position_by_symbol("AAPL").unwrap().id().to_owned();
    let closed = engine.close_position(&id, dec!(120)).unwrap().unwrap();

    assert_eq!(closed.realized_pnl(), Some(dec!(200)));
    assert_eq!(engine.balance(), dec!(10200));
    assert_eq!(engine.realized_pnl(), dec!(200));
    assert!(engine.position_by_symbol("AAPL").is_none());
    assert_eq!(engine.closed_positions().count(), 1);

    let trades = trades(&rx);
    assert_eq!(trades.len(), 1);
    let trade = &trades[0];
    assert_eq!(trade.side, PositionSide::Long);
    assert_eq!(trade.entry_price, dec!(100));
    assert_eq!(trade.exit_price, dec!(120));
    assert_eq!(trade.quantity, dec!(10));
    assert!(trade.tags.iter().any(|t| t == PAPER_TRADE_TAG));
    assert!(trade.notes.contains("WIN"));
}

#[test]
fn scenario_short_profits_when_price_falls() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    engine.place_market_order(sell("AAPL", dec!(10), dec!(100))).unwrap();
    assert_eq!(engine.balance(), dec!(9000));

    let id = engine.position_by_symbol("AAPL").unwrap().id().to_owned();
    let closed = engine.close_position(&id, dec!(90)).unwrap().unwrap();

    assert_eq!(closed.side(), PositionSide::Short);
    assert_eq!(closed.realized_pnl(), Some(dec!(100)));
    assert_eq!(engine.balance(), dec!(10100));
}

#[test]
fn scenario_short_stop_loss_closes_at_threshold() {
    let (mut engine, rx) = get_engine(dec!(10000));
    engine
        .place_market_order(sell("AAPL", dec!(10), dec!(100)).stop_loss(dec!(110)))
        .unwrap();

    assert!(engine.check_stop_loss_take_profit("AAPL", dec!(105)).unwrap().is_none());
    let closed = engine.check_stop_loss_take_profit("AAPL", dec!(111)).unwrap().unwrap();

    assert_eq!(closed.exit_price(), Some(dec!(110)));
    assert_eq!(closed.realized_pnl(), Some(dec!(-100)));
    assert_eq!(engine.balance(), dec!(9900));
    assert_eq!(engine.realized_pnl(), dec!(-100));

    let trades = trades(&rx);
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].reason, CloseReason::StopLoss);
    assert!(trades[0].notes.contains("LOSS"));
    assert!(trades[0].tags.iter().any(|t| t == "stop-loss"));
}

#[test]
fn scenario_long_take_profit() {
    let (mut engine, rx) = get_engine(dec!(1000));
    let price = dec!(100);
    engine
        .place_market_order(
            buy("BTC", dec!(1), price)
                .stop_loss(price.subpercent(dec!(5)))
                .take_profit(price.addpercent(dec!(20))),
        )
        .unwrap();
    assert_eq!(engine.balance(), dec!(900));

    // next tick, p&l = +10
    assert!(engine.check_stop_loss_take_profit("BTC", dec!(110)).unwrap().is_none());
    assert_eq!(engine.equity(&prices(&[("BTC", dec!(110))])), dec!(910));

    // next tick, take profit matched
    let closed = engine.check_stop_loss_take_profit("BTC", dec!(125)).unwrap().unwrap();
    assert_eq!(closed.exit_price(), Some(dec!(120)));
    assert_eq!(engine.balance(), dec!(1020));
    assert_eq!(trades(&rx)[0].reason, CloseReason::TakeProfit);
}

#[test]
fn scenario_stop_loss_wins_tie() {
    let (mut engine, _rx) = get_engine(dec!(1000));
    engine
        .place_market_order(buy("BTC", dec!(1), dec!(100)).stop_loss(dec!(105)).take_profit(dec!(102)))
        .unwrap();

    let closed = engine.check_stop_loss_take_profit("BTC", dec!(103)).unwrap().unwrap();
    assert_eq!(closed.exit_price(), Some(dec!(105)));
}

#[test]
fn scenario_trigger_without_position_is_noop() {
    let (mut engine, rx) = get_engine(dec!(1000));
    assert!(engine.check_stop_loss_take_profit("AAPL", dec!(1)).unwrap().is_none());
    assert_eq!(engine.balance(), dec!(1000));
    assert!(trades(&rx).is_empty());
}

#[test]
fn scenario_merge_same_side_orders() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    engine.place_market_order(buy("AAPL", dec!(10), dec!(100))).unwrap();
    engine
        .place_market_order(buy("AAPL", dec!(10), dec!(120)).take_profit(dec!(150)))
        .unwrap();

    let position = engine.position_by_symbol("AAPL").unwrap();
    assert_eq!(position.quantity(), dec!(20));
    assert_eq!(position.entry_price(), dec!(110));
    assert_eq!(position.take_profit(), Some(dec!(150)));
    assert_eq!(engine.positions().count(), 1);
    assert_eq!(engine.orders().count(), 2);
    assert_eq!(engine.balance(), dec!(7800));

    // capital returned at the averaged cost basis
    let id = position.id().to_owned();
    engine.close_position(&id, dec!(110)).unwrap();
    assert_eq!(engine.balance(), dec!(10000));
    assert_eq!(engine.realized_pnl(), Decimal::ZERO);
}

#[test]
fn scenario_opposite_side_order_rejected() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    engine.place_market_order(buy("AAPL", dec!(10), dec!(100))).unwrap();

    let result = engine.place_market_order(sell("AAPL", dec!(5), dec!(110)));
    assert!(matches!(result, Err(Error::OppositeSide { .. })));
    assert_eq!(engine.balance(), dec!(9000));
    assert_eq!(engine.position_by_symbol("AAPL").unwrap().quantity(), dec!(10));
    assert_eq!(engine.orders().last().map(Order::status), Some(OrderStatus::Rejected));
}

#[test]
fn scenario_invalid_orders_rejected() {
    let (mut engine, _rx) = get_engine(dec!(1000));

    let result = engine.place_market_order(buy("AAPL", Decimal::ZERO, dec!(100)));
    assert!(matches!(result, Err(Error::InvalidQuantity(_))));
    let result = engine.place_market_order(buy("AAPL", dec!(-1), dec!(100)));
    assert!(matches!(result, Err(Error::InvalidQuantity(_))));
    let result = engine.place_market_order(buy("AAPL", dec!(1), Decimal::ZERO));
    assert!(matches!(result, Err(Error::InvalidPrice(_))));
    let result = engine.place_market_order(buy("AAPL", dec!(1), dec!(100)).stop_loss(dec!(-5)));
    assert!(matches!(result, Err(Error::InvalidPrice(_))));
    let result = engine.place_market_order(buy("AAPL", dec!(11), dec!(100)));
    assert!(matches!(result, Err(Error::InsufficientFunds(_, _))));

    assert_eq!(engine.balance(), dec!(1000));
    assert_eq!(engine.positions().count(), 0);
    assert_eq!(engine.orders().count(), 5);
    assert!(engine.orders().all(|o| o.status() == OrderStatus::Rejected));
}

#[test]
fn scenario_double_close_is_noop() {
    let (mut engine, rx) = get_engine(dec!(10000));
    engine.place_market_order(buy("AAPL", dec!(10), dec!(100))).unwrap();
    let id = engine.position_by_symbol("AAPL").unwrap().id().to_owned();

    assert!(engine.close_position(&id, dec!(120)).unwrap().is_some());
    let balance = engine.balance();
    let realized = engine.realized_pnl();

    assert!(engine.close_position(&id, dec!(130)).unwrap().is_none());
    assert_eq!(engine.balance(), balance);
    assert_eq!(engine.realized_pnl(), realized);
    assert_eq!(engine.closed_positions().count(), 1);
    assert_eq!(trades(&rx).len(), 1);
}

#[test]
fn scenario_close_unknown_position() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    let result = engine.close_position("pos-missing", dec!(100));
    assert!(matches!(result, Err(Error::PositionNotFound(_))));
    assert_eq!(engine.balance(), dec!(10000));
}

#[test]
fn scenario_close_with_invalid_price() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    engine.place_market_order(buy("AAPL", dec!(10), dec!(100))).unwrap();
    let id = engine.position_by_symbol("AAPL").unwrap().id().to_owned();

    assert!(matches!(engine.close_position(&id, Decimal::ZERO), Err(Error::InvalidPrice(_))));
    assert!(engine.position(&id).is_some());
}

#[test]
fn scenario_close_all_with_partial_quotes() {
    let (mut engine, rx) = get_engine(dec!(10000));
    engine.place_market_order(buy("AAPL", dec!(10), dec!(100))).unwrap();
    engine.place_market_order(sell("GOOGL", dec!(5), dec!(200))).unwrap();
    engine.place_market_order(buy("MSFT", dec!(1), dec!(300))).unwrap();
    assert_eq!(engine.balance(), dec!(7700));

    let closed = engine
        .close_all(&prices(&[("AAPL", dec!(110)), ("GOOGL", dec!(220))]))
        .unwrap();

    assert_eq!(closed.len(), 2);
    assert_eq!(engine.closed_positions().count(), 2);
    assert_eq!(engine.positions().map(Position::symbol).collect::<Vec<_>>(), vec!["MSFT"]);
    // +100 on AAPL, -100 on GOOGL
    assert_eq!(engine.realized_pnl(), Decimal::ZERO);
    assert_eq!(engine.balance(), dec!(9700));
    assert!(trades(&rx).iter().all(|t| t.reason == CloseReason::CloseAll));
}

#[test]
fn scenario_close_all_rejects_invalid_quote() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    engine.place_market_order(buy("AAPL", dec!(10), dec!(100))).unwrap();
    engine.place_market_order(buy("GOOGL", dec!(5), dec!(200))).unwrap();

    let result = engine.close_all(&prices(&[("AAPL", dec!(110)), ("GOOGL", dec!(-1))]));
    assert!(matches!(result, Err(Error::InvalidPrice(_))));
    assert_eq!(engine.positions().count(), 2);
}

#[test]
fn scenario_equity_and_unrealized_pnl() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    engine.place_market_order(buy("AAPL", dec!(10), dec!(100))).unwrap();
    engine.place_market_order(sell("GOOGL", dec!(5), dec!(200))).unwrap();

    let mut quotes = BTreeMap::new();
    quotes.insert("AAPL".to_owned(), dec!(105));
    quotes.insert("GOOGL".to_owned(), dec!(190));

    // +50 long, +50 short
    assert_eq!(engine.unrealized_pnl(&quotes), dec!(100));
    assert_eq!(engine.equity(&quotes), engine.balance() + engine.unrealized_pnl(&quotes));
    assert_eq!(engine.equity(&quotes), dec!(8100));

    // unquoted symbols count as zero
    quotes.remove("GOOGL");
    assert_eq!(engine.unrealized_pnl(&quotes), dec!(50));
}

#[test]
fn scenario_linked_tool_callback_after_journal() {
    let (mut engine, rx) = get_engine(dec!(10000));
    engine
        .place_market_order(buy("AAPL", dec!(10), dec!(100)).linked_tool("tool-42"))
        .unwrap();
    engine.place_market_order(buy("GOOGL", dec!(1), dec!(100))).unwrap();
    let id = engine.position_by_symbol("AAPL").unwrap().id().to_owned();

    engine.close_position(&id, dec!(90)).unwrap();
    let events = rx.try_iter().collect::<Vec<_>>();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], EngineEvent::TradeClosed(trade) if trade.position_id == id));
    assert_eq!(
        events[1],
        EngineEvent::ToolClosed {
            position_id: id,
            linked_tool_id: "tool-42".to_owned(),
        }
    );

    // no tool, no tool callback
    let id = engine.position_by_symbol("GOOGL").unwrap().id().to_owned();
    engine.close_position(&id, dec!(90)).unwrap();
    let events = rx.try_iter().collect::<Vec<_>>();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], EngineEvent::TradeClosed(_)));
}

#[test]
fn scenario_update_thresholds() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    engine.place_market_order(buy("AAPL", dec!(10), dec!(100))).unwrap();
    let id = engine.position_by_symbol("AAPL").unwrap().id().to_owned();

    assert!(engine.update_stop_loss(&id, Some(dec!(95))));
    assert!(engine.update_take_profit(&id, Some(dec!(130))));
    assert!(!engine.update_stop_loss(&id, Some(Decimal::ZERO)));
    assert!(!engine.update_take_profit("pos-missing", Some(dec!(130))));

    let position = engine.position(&id).unwrap();
    assert_eq!(position.stop_loss(), Some(dec!(95)));
    assert_eq!(position.take_profit(), Some(dec!(130)));

    let closed = engine.check_stop_loss_take_profit("AAPL", dec!(94)).unwrap().unwrap();
    assert_eq!(closed.exit_price(), Some(dec!(95)));

    // closed positions can no longer be updated
    assert!(!engine.update_stop_loss(&id, Some(dec!(90))));
    assert!(!engine.update_take_profit(&id, None));
}

#[test]
fn scenario_check_all() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    engine
        .place_market_order(buy("AAPL", dec!(10), dec!(100)).stop_loss(dec!(90)))
        .unwrap();
    engine
        .place_market_order(sell("GOOGL", dec!(5), dec!(200)).take_profit(dec!(180)))
        .unwrap();
    engine
        .place_market_order(buy("MSFT", dec!(1), dec!(300)).take_profit(dec!(400)))
        .unwrap();

    let closed = engine
        .check_all(&prices(&[("AAPL", dec!(89)), ("GOOGL", dec!(175)), ("MSFT", dec!(310))]))
        .unwrap();

    assert_eq!(closed.len(), 2);
    assert_eq!(engine.positions().count(), 1);
    // -100 on AAPL, +100 on GOOGL
    assert_eq!(engine.realized_pnl(), Decimal::ZERO);
}

#[test]
fn scenario_deposit_and_withdraw() {
    let (mut engine, _rx) = get_engine(dec!(1000));
    assert_eq!(engine.deposit(dec!(500)).unwrap(), dec!(1500));
    assert!(matches!(engine.deposit(Decimal::ZERO), Err(Error::InvalidAmount(_))));

    assert_eq!(engine.withdraw(dec!(200)).unwrap(), dec!(1300));
    assert!(matches!(engine.withdraw(dec!(5000)), Err(Error::InsufficientFunds(_, _))));
    assert_eq!(engine.balance(), dec!(1300));
}

#[test]
fn scenario_reset_clears_book() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    engine.place_market_order(buy("AAPL", dec!(10), dec!(100))).unwrap();
    engine.place_market_order(buy("GOOGL", dec!(5), dec!(200))).unwrap();
    let id = engine.position_by_symbol("GOOGL").unwrap().id().to_owned();
    engine.close_position(&id, dec!(210)).unwrap();

    engine.reset(None).unwrap();
    assert_eq!(engine.balance(), dec!(10000));
    assert_eq!(engine.realized_pnl(), Decimal::ZERO);
    assert_eq!(engine.positions().count(), 0);
    assert_eq!(engine.closed_positions().count(), 0);
    assert_eq!(engine.orders().count(), 2);

    engine.reset(Some(dec!(2500))).unwrap();
    assert_eq!(engine.balance(), dec!(2500));
    assert_eq!(engine.initial_balance(), dec!(2500));
}

#[test]
fn scenario_snapshot_and_restore() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    engine
        .place_market_order(buy("AAPL", dec!(10), dec!(100)).stop_loss(dec!(90)))
        .unwrap();
    engine.place_market_order(sell("GOOGL", dec!(5), dec!(200))).unwrap();
    let id = engine.position_by_symbol("GOOGL").unwrap().id().to_owned();
    engine.close_position(&id, dec!(190)).unwrap();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.positions.len(), 2);

    let mut restored = Engine::from_snapshot(snapshot.clone());
    assert_eq!(restored.account(), engine.account());
    assert_eq!(restored.positions().count(), 1);
    assert_eq!(restored.closed_positions().count(), 1);

    // a closed id stays closed after rehydration
    assert!(restored.close_position(&id, dec!(150)).unwrap().is_none());
    let closed = restored.check_stop_loss_take_profit("AAPL", dec!(85)).unwrap().unwrap();
    assert_eq!(closed.exit_price(), Some(dec!(90)));

    let mut other = Engine::new(dec!(1)).unwrap();
    other.restore_account(snapshot.account.clone());
    other.restore_positions(snapshot.positions);
    assert_eq!(other.balance(), engine.balance());
    assert!(other.position_by_symbol("AAPL").is_some());
}

#[test]
fn scenario_risk_based_sizing() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    let quantity = engine.position_size_for(dec!(1), dec!(100), dec!(95));
    assert_eq!(quantity, dec!(20));
    assert_eq!(engine.position_size_for(dec!(1), dec!(100), dec!(100)), Decimal::ZERO);

    engine
        .place_market_order(buy("AAPL", quantity, dec!(100)).stop_loss(dec!(95)))
        .unwrap();
    let closed = engine.check_stop_loss_take_profit("AAPL", dec!(95)).unwrap().unwrap();

    // the stop loses exactly the risked amount
    assert_eq!(closed.realized_pnl(), Some(-dec!(10000).how_many(dec!(1))));
}

#[test]
fn scenario_overflowing_order_rejected() {
    let (mut engine, rx) = get_engine(dec!(10000));
    engine.place_market_order(buy("AAPL", dec!(10), dec!(100))).unwrap();

    let result = engine.place_market_order(buy("AAPL", Decimal::MAX, dec!(2)));
    assert!(matches!(result, Err(Error::Overflow(_))));
    let result = engine.place_market_order(sell("GOOGL", dec!(2), Decimal::MAX));
    assert!(matches!(result, Err(Error::Overflow(_))));

    assert_eq!(engine.balance(), dec!(9000));
    assert_eq!(engine.positions().count(), 1);
    assert_eq!(engine.position_by_symbol("AAPL").unwrap().quantity(), dec!(10));
    assert_eq!(engine.orders().filter(|o| o.status() == OrderStatus::Rejected).count(), 2);

    // a close whose P&L cannot be represented leaves the position open
    let id = engine.position_by_symbol("AAPL").unwrap().id().to_owned();
    let result = engine.close_position(&id, Decimal::MAX);
    assert!(matches!(result, Err(Error::Overflow(_))));
    assert!(engine.position(&id).is_some());
    assert_eq!(engine.balance(), dec!(9000));
    assert!(trades(&rx).is_empty());

    // mark-to-market saturates instead
    assert_eq!(engine.equity(&prices(&[("AAPL", Decimal::MAX)])), Decimal::MAX);
}

#[test]
fn scenario_non_positive_tick_rejected() {
    let (mut engine, rx) = get_engine(dec!(10000));
    engine
        .place_market_order(buy("AAPL", dec!(10), dec!(100)).stop_loss(dec!(90)))
        .unwrap();
    engine
        .place_market_order(buy("GOOGL", dec!(5), dec!(200)).stop_loss(dec!(180)))
        .unwrap();

    let result = engine.check_stop_loss_take_profit("AAPL", Decimal::ZERO);
    assert!(matches!(result, Err(Error::InvalidPrice(_))));
    let result = engine.check_stop_loss_take_profit("AAPL", dec!(-1));
    assert!(matches!(result, Err(Error::InvalidPrice(_))));

    // GOOGL would trigger, but the bad AAPL quote refuses the whole sweep
    let result = engine.check_all(&prices(&[("AAPL", Decimal::ZERO), ("GOOGL", dec!(170))]));
    assert!(matches!(result, Err(Error::InvalidPrice(_))));

    assert_eq!(engine.positions().count(), 2);
    assert_eq!(engine.balance(), dec!(8000));
    assert!(trades(&rx).is_empty());
}

#[test]
fn scenario_restore_with_duplicate_symbol() {
    let (mut engine, _rx) = get_engine(dec!(10000));
    let now = chrono::Utc::now();
    let first = Position::new("AAPL", PositionSide::Long, dec!(1), dec!(100), now);
    let second = Position::new("AAPL", PositionSide::Long, dec!(3), dec!(120), now);

    engine.restore_positions(vec![first.clone(), second]);
    assert_eq!(engine.positions().collect::<Vec<_>>(), vec![&first]);
}
