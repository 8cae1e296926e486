//! Holder-count deltas derived from balance transitions.
//!
//! All reads happen before either side of the transfer is mutated.

use crate::collaborators::AccountBalanceLedger;
use crate::error::AccountingError;
use crate::repository::Token;
use alloy_primitives::{Address, U256};
use anyhow::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HolderDelta {
    /// Sender's balance equals the amount and will hit zero.
    pub from_became_zero: bool,
    /// Receiver held nothing before.
    pub to_was_zero: bool,
    /// Receiver has never held this token.
    pub is_new_holder: bool,
}

impl HolderDelta {
    pub fn current(&self) -> i64 {
        i64::from(self.to_was_zero) - i64::from(self.from_became_zero)
    }

    pub fn cumulative(&self) -> u64 {
        u64::from(self.is_new_holder)
    }

    pub fn for_transfer<L: AccountBalanceLedger + ?Sized>(
        ledger: &L,
        token: &str,
        source: Address,
        destination: Address,
        amount: U256,
    ) -> Result<Self> {
        // Self-transfer leaves the balance untouched.
        if source == destination {
            return Ok(Self::default());
        }

        let from_became_zero = becomes_zero(ledger, token, source, amount)?;
        let (is_new_holder, to_was_zero) = receives(ledger, token, destination)?;

        Ok(Self {
            from_became_zero,
            to_was_zero,
            is_new_holder,
        })
    }

    pub fn for_mint<L: AccountBalanceLedger + ?Sized>(
        ledger: &L,
        token: &str,
        destination: Address,
    ) -> Result<Self> {
        let (is_new_holder, to_was_zero) = receives(ledger, token, destination)?;
        Ok(Self {
            from_became_zero: false,
            to_was_zero,
            is_new_holder,
        })
    }

    pub fn for_burn<L: AccountBalanceLedger + ?Sized>(
        ledger: &L,
        token: &str,
        burner: Address,
        amount: U256,
    ) -> Result<Self> {
        Ok(Self {
            from_became_zero: becomes_zero(ledger, token, burner, amount)?,
            ..Self::default()
        })
    }

    pub fn apply(&self, token: &mut Token) -> Result<(), AccountingError> {
        let current = token.current_holder_count + self.current();
        if current < 0 {
            return Err(AccountingError::NegativeHolderCount {
                token: token.id.clone(),
                value: current,
            });
        }
        token.current_holder_count = current;
        token.cumulative_holder_count += self.cumulative();
        Ok(())
    }
}

fn becomes_zero<L: AccountBalanceLedger + ?Sized>(
    ledger: &L,
    token: &str,
    account: Address,
    amount: U256,
) -> Result<bool> {
    let balance = ledger.get_or_create(account, token)?;
    Ok(balance.amount == amount)
}

/// `(is_new_holder, was_zero)` for the receiving side.
fn receives<L: AccountBalanceLedger + ?Sized>(
    ledger: &L,
    token: &str,
    account: Address,
) -> Result<(bool, bool)> {
    let is_new = ledger.is_new_account(account, token)?;
    let balance = ledger.get_or_create(account, token)?;
    Ok((is_new, balance.amount.is_zero()))
}
