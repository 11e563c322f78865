//! # Paper trading session
//!
//! Replays a short price tape against the engine: risk-sized entries with
//! stop-loss/take-profit exits, a journal collecting the closed trades and a
//! chart tool linked to one of the positions.
//!
//! Engine logs are printed at debug level by the fmt subscriber.
//! `cargo run --example session --features metrics`

use std::collections::HashMap;

use pts_rs::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Journal collecting every closed trade, and the chart tools to clear.
#[derive(Default)]
struct Journal {
    trades: std::rc::Rc<std::cell::RefCell<Vec<Trade>>>,
}

impl TradeListener for Journal {
    fn on_trade_closed(&mut self, trade: &Trade) {
        println!("journal: {}", trade.notes);
        self.trades.borrow_mut().push(trade.clone());
    }

    fn on_position_closed(&mut self, position_id: &str, linked_tool_id: &str) {
        println!("chart: remove tool {linked_tool_id} of {position_id}");
    }
}

fn tape() -> Vec<HashMap<String, Decimal>> {
    [
        (dec!(100), dec!(2000)),
        (dec!(103), dec!(1980)),
        (dec!(108), dec!(1950)),
        (dec!(112), dec!(1990)),
        (dec!(109), dec!(2060)),
    ]
    .into_iter()
    .map(|(aapl, eth)| HashMap::from([("AAPL".to_string(), aapl), ("ETH".to_string(), eth)]))
    .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let journal = Journal::default();
    let trades = journal.trades.clone();
    let initial_balance = dec!(10_000);
    let mut engine = Engine::new(initial_balance)?.with_listener(journal);

    let tape = tape();
    for (tick, prices) in tape.iter().enumerate() {
        if tick == 0 {
            // long AAPL: risk 1% with a 3% stop, 2R target
            let price = prices["AAPL"];
            let stop = price.subpercent(dec!(3));
            let quantity = engine.position_size_for(dec!(1), price, stop);
            let request = OrderRequest::from(("AAPL", OrderSide::Buy, quantity, price))
                .stop_loss(stop)
                .take_profit(price.addpercent(dec!(6)))
                .linked_tool("ray-1");
            engine.place_market_order(request)?;

            // short ETH: risk 1% with a 2% stop
            let price = prices["ETH"];
            let stop = price.addpercent(dec!(2));
            let quantity = engine.position_size_for(dec!(1), price, stop);
            let request = OrderRequest::from(("ETH", OrderSide::Sell, quantity, price)).stop_loss(stop);
            engine.place_market_order(request)?;
        }

        engine.check_all(prices)?;
        println!(
            "tick {tick}: balance {:.2}, equity {:.2}",
            engine.balance(),
            engine.equity(prices)
        );
    }

    let last = tape.last().cloned().unwrap_or_default();
    engine.close_all(&last)?;

    let trades = trades.borrow();
    println!("{} trades journaled", trades.len());
    let balance = engine.balance();
    println!(
        "performance {balance:.2} ({:.2}%)",
        initial_balance.change(balance)
    );

    #[cfg(feature = "metrics")]
    {
        let metrics = Metrics::from(&engine);
        println!("{metrics}");
    }

    Ok(())
}
