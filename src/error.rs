use alloy_primitives::U256;
use thiserror::Error;

/// Invariant violations detected while reducing one event. Any of these aborts
/// the event; nothing it touched is persisted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountingError {
    #[error("burn of {amount} exceeds tracked supply {supply} of token {token}")]
    SupplyUnderflow {
        token: String,
        supply: U256,
        amount: U256,
    },

    #[error("current holder count of token {token} would become {value}")]
    NegativeHolderCount { token: String, value: i64 },

    #[error("{field} overflowed on token {token}")]
    AmountOverflow { token: String, field: &'static str },
}
