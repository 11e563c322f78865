use rust_decimal::Decimal;

/// Computes the quantity that risks `risk_percent` of `balance` between entry and stop.
///
/// ### Arguments
/// * `balance` - Account balance the risk is taken from.
/// * `risk_percent` - Percentage of the balance to risk (e.g., 1 for 1%).
/// * `entry_price` - Planned entry price.
/// * `stop_loss_price` - Planned stop-loss price, on either side of the entry.
///
/// ### Returns
/// The position quantity, or zero when entry and stop are equal or when the quantity
/// does not fit in a `Decimal`.
pub fn position_size(balance: Decimal, risk_percent: Decimal, entry_price: Decimal, stop_loss_price: Decimal) -> Decimal {
    let per_unit_risk = (entry_price - stop_loss_price).abs();
    if per_unit_risk.is_zero() {
        return Decimal::ZERO;
    }
    (balance / Decimal::ONE_HUNDRED)
        .checked_mul(risk_percent)
        .and_then(|risk| risk.checked_div(per_unit_risk))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
use rust_decimal_macros::dec;

#[cfg(test)]
#[test]
fn long_setup() {
    assert_eq!(position_size(dec!(10000), dec!(1), dec!(100), dec!(95)), dec!(20));
}

#[cfg(test)]
#[test]
fn short_setup() {
    // stop above entry
    assert_eq!(position_size(dec!(10000), dec!(2), dec!(100), dec!(110)), dec!(20));
}

#[cfg(test)]
#[test]
fn degenerate_stop() {
    assert_eq!(position_size(dec!(10000), dec!(1), dec!(100), dec!(100)), Decimal::ZERO);
}

#[cfg(test)]
#[test]
fn unrepresentable_size() {
    // per-unit risk of 1e-28
    let (entry, stop) = (Decimal::new(2, 28), Decimal::new(1, 28));
    assert_eq!(position_size(dec!(10000), dec!(1), entry, stop), Decimal::ZERO);
    assert_eq!(position_size(Decimal::MAX, Decimal::MAX, dec!(100), dec!(95)), Decimal::ZERO);
}
