use rust_decimal::Decimal;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the engine. None of them leaves the engine in a partial state.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The initial or reset balance is not positive. An account requires a positive balance.
    #[error("Balance must be positive (got: {0})")]
    NegZeroBalance(Decimal),

    /// The order quantity is zero or negative. The order is rejected without any state change.
    #[error("Quantity must be positive (got: {0})")]
    InvalidQuantity(Decimal),

    /// A fill, exit or threshold price is zero or negative.
    #[error("Price must be positive (got: {0})")]
    InvalidPrice(Decimal),

    /// A deposit or withdrawal amount is zero or negative.
    #[error("Amount must be positive (got: {0})")]
    InvalidAmount(Decimal),

    /// The account does not have enough funds.
    /// Expected: {0}, Available: {1}
    #[error("Insufficient funds: required {0}, available {1}")]
    InsufficientFunds(Decimal, Decimal),

    /// No open or closed position carries this id.
    #[error("Position not found: {0}")]
    PositionNotFound(String),

    /// An order arrived on the opposite side of an open position for the same symbol.
    #[error("Opposite side order on open position for {symbol}")]
    OppositeSide {
        /// Symbol of the open position.
        symbol: String,
    },

    /// A monetary amount does not fit in a `Decimal`. The operation is refused before any state change.
    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),

    /// I/O error occurred.
    #[cfg(feature = "serde")]
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
