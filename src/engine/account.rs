#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rust_decimal::Decimal;

use crate::{
    errors::{Error, Result},
    utils::record_id,
};

/// Represents the virtual brokerage account: cash balance and booked profit/loss.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    id: String,
    // Balance restored on reset
    initial_balance: Decimal,
    // Cash balance, capital committed to open positions excluded
    balance: Decimal,
    // Cumulative profit/loss booked by closed positions
    realized_pnl: Decimal,
    user_id: Option<String>,
}

impl Account {
    /// Creates a new account with the given initial balance.
    /// Zero and negative balances are rejected.
    pub fn new(balance: Decimal) -> Result<Self> {
        if balance <= Decimal::ZERO {
            return Err(Error::NegZeroBalance(balance));
        }

        Ok(Self {
            balance,
            id: record_id("acc"),
            initial_balance: balance,
            realized_pnl: Decimal::ZERO,
            user_id: None,
        })
    }

    /// Rebuilds an account from persisted fields.
    pub fn from_parts(
        id: impl Into<String>,
        balance: Decimal,
        initial_balance: Decimal,
        realized_pnl: Decimal,
        user_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            balance,
            initial_balance,
            realized_pnl,
            user_id,
        }
    }

    /// Attaches the owning user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Returns the account id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the owning user, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the balance.
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Returns the balance the account was opened (or last reset) with.
    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    /// Returns the cumulative realized profit/loss.
    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Adds funds to the account.
    pub(crate) fn deposit(&mut self, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }
        self.balance = self.balance.checked_add(amount).ok_or(Error::Overflow("balance"))?;
        Ok(self.balance)
    }

    /// Removes funds from the account. The balance is left untouched when it cannot cover `amount`.
    pub(crate) fn withdraw(&mut self, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }
        if amount > self.balance {
            return Err(Error::InsufficientFunds(amount, self.balance));
        }
        self.balance -= amount;
        Ok(self.balance)
    }

    /// Reserves the cost basis of a fill.
    pub(crate) fn debit(&mut self, cost: Decimal) -> Result<Decimal> {
        if cost > self.balance {
            return Err(Error::InsufficientFunds(cost, self.balance));
        }
        self.balance -= cost;
        Ok(self.balance)
    }

    /// Returns the committed capital plus the booked profit/loss of a close.
    /// Nothing changes when the new balance or realized P&L overflows.
    pub(crate) fn settle(&mut self, cost: Decimal, pnl: Decimal) -> Result<Decimal> {
        let balance = self
            .balance
            .checked_add(cost)
            .and_then(|balance| balance.checked_add(pnl))
            .ok_or(Error::Overflow("balance"))?;
        let realized_pnl = self.realized_pnl.checked_add(pnl).ok_or(Error::Overflow("realized P&L"))?;
        self.balance = balance;
        self.realized_pnl = realized_pnl;
        Ok(balance)
    }

    /// Resets the account to `balance`, or to its initial balance.
    pub(crate) fn reset(&mut self, balance: Option<Decimal>) -> Result<()> {
        let balance = balance.unwrap_or(self.initial_balance);
        if balance <= Decimal::ZERO {
            return Err(Error::NegZeroBalance(balance));
        }
        self.balance = balance;
        self.initial_balance = balance;
        self.realized_pnl = Decimal::ZERO;
        Ok(())
    }
}

#[cfg(test)]
use rust_decimal_macros::dec;

#[cfg(test)]
#[test]
fn new_account_valid_balance() {
    let account = Account::new(dec!(100)).unwrap();
    assert_eq!(account.balance(), dec!(100));
    assert_eq!(account.initial_balance(), dec!(100));
    assert_eq!(account.realized_pnl(), Decimal::ZERO);
    assert!(account.id().starts_with("acc-"));
    assert!(account.user_id().is_none());
}

#[cfg(test)]
#[test]
fn new_account_invalid_balance() {
    let result = Account::new(Decimal::ZERO);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));

    let result = Account::new(dec!(-10));
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));
}

#[cfg(test)]
#[test]
fn deposit_funds() {
    let mut account = Account::new(dec!(100)).unwrap();
    assert_eq!(account.deposit(dec!(50)).unwrap(), dec!(150));
    assert!(matches!(account.deposit(Decimal::ZERO), Err(Error::InvalidAmount(_))));
    assert!(matches!(account.deposit(dec!(-1)), Err(Error::InvalidAmount(_))));
    assert_eq!(account.balance(), dec!(150));
}

#[cfg(test)]
#[test]
fn withdraw_funds() {
    let mut account = Account::new(dec!(100)).unwrap();
    assert_eq!(account.withdraw(dec!(40)).unwrap(), dec!(60));
    // exact balance is allowed
    assert_eq!(account.withdraw(dec!(60)).unwrap(), Decimal::ZERO);
}

#[cfg(test)]
#[test]
fn withdraw_insufficient_funds() {
    let mut account = Account::new(dec!(100)).unwrap();
    let result = account.withdraw(dec!(150));
    assert!(matches!(result, Err(Error::InsufficientFunds(_, _))));
    assert_eq!(account.balance(), dec!(100));
}

#[cfg(test)]
#[test]
fn debit_and_settle_profit() {
    let mut account = Account::new(dec!(100)).unwrap();

    // open position
    assert_eq!(account.debit(dec!(20)).unwrap(), dec!(80));

    // close profitable position: 20 (cost) + 10 (profit)
    assert_eq!(account.settle(dec!(20), dec!(10)).unwrap(), dec!(110));
    assert_eq!(account.realized_pnl(), dec!(10));
}

#[cfg(test)]
#[test]
fn debit_and_settle_loss() {
    let mut account = Account::new(dec!(100)).unwrap();
    account.debit(dec!(20)).unwrap();

    // close unprofitable position: 20 (cost) - 10 (loss)
    assert_eq!(account.settle(dec!(20), dec!(-10)).unwrap(), dec!(90));
    assert_eq!(account.realized_pnl(), dec!(-10));
}

#[cfg(test)]
#[test]
fn overflowing_amounts_leave_balance_unchanged() {
    let mut account = Account::new(dec!(100)).unwrap();
    assert!(matches!(account.deposit(Decimal::MAX), Err(Error::Overflow(_))));
    assert!(matches!(account.settle(Decimal::MAX, dec!(1)), Err(Error::Overflow(_))));
    assert_eq!(account.balance(), dec!(100));
    assert_eq!(account.realized_pnl(), Decimal::ZERO);
}

#[cfg(test)]
#[test]
fn debit_insufficient_funds() {
    let mut account = Account::new(dec!(100)).unwrap();
    assert!(matches!(account.debit(dec!(101)), Err(Error::InsufficientFunds(_, _))));
    assert_eq!(account.balance(), dec!(100));
}

#[cfg(test)]
#[test]
fn reset_account() {
    let mut account = Account::new(dec!(100)).unwrap();
    account.debit(dec!(20)).unwrap();
    account.settle(dec!(20), dec!(5)).unwrap();

    account.reset(None).unwrap();
    assert_eq!(account.balance(), dec!(100));
    assert_eq!(account.realized_pnl(), Decimal::ZERO);

    account.reset(Some(dec!(500))).unwrap();
    assert_eq!(account.balance(), dec!(500));
    assert_eq!(account.initial_balance(), dec!(500));

    assert!(matches!(account.reset(Some(Decimal::ZERO)), Err(Error::NegZeroBalance(_))));
    assert_eq!(account.balance(), dec!(500));
}
