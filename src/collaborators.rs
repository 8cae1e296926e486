//! Interfaces the accounting core consumes.
//!
//! The core never talks to a database or a node directly. It reads and writes
//! entities through [`KeyedStore`], moves balances through
//! [`AccountBalanceLedger`] and asks the chain for supply and metadata through
//! [`ChainSupplyOracle`] and [`TokenRegistry`].
//!
//! ## Delivery contract
//!
//! Events must be handed to the core one at a time, in block order and then
//! log-index order within a block, exactly once. The core performs no
//! deduplication of replayed logs; the only duplicate it absorbs is the
//! dual-emitted mint/burn described in `accounting::guard`.

use crate::bucket::Cadence;
use crate::events::BlockRef;
use crate::repository::{
    AccountBalance, BridgeTransferEvent, Token, TokenMetadata, TokenSnapshot, TransferEvent,
};
use alloy_primitives::{Address, U256};
use anyhow::Result;

/// Load/save access to persisted aggregates, keyed by the strings in `keys`.
pub trait KeyedStore {
    fn load_token(&self, id: &str) -> Result<Option<Token>>;
    fn save_token(&mut self, token: &Token) -> Result<()>;

    fn load_snapshot(&self, cadence: Cadence, id: &str) -> Result<Option<TokenSnapshot>>;
    fn save_snapshot(&mut self, snapshot: &TokenSnapshot) -> Result<()>;

    /// Write-once: a second save under the same id is ignored.
    fn save_transfer_event(&mut self, event: &TransferEvent) -> Result<()>;
    /// Write-once: a second save under the same id is ignored.
    fn save_bridge_event(&mut self, event: &BridgeTransferEvent) -> Result<()>;
}

/// Per-(account, token) balances.
pub trait AccountBalanceLedger {
    /// Stored balance, or a zero balance that is not persisted until the
    /// first increase.
    fn get_or_create(&self, account: Address, token: &str) -> Result<AccountBalance>;

    /// True if the account has never had a balance record for this token.
    fn is_new_account(&self, account: Address, token: &str) -> Result<bool>;

    fn increase(
        &mut self,
        account: Address,
        token: &str,
        amount: U256,
        block: &BlockRef,
    ) -> Result<AccountBalance>;

    /// Clamps at zero. An account with no record is left without one.
    fn decrease(
        &mut self,
        account: Address,
        token: &str,
        amount: U256,
        block: &BlockRef,
    ) -> Result<AccountBalance>;
}

/// Hook invoked after every balance mutation.
pub trait AccountBalanceSnapshotUpdater {
    fn on_balance_changed(&mut self, balance: &AccountBalance, block: &BlockRef) -> Result<()>;
}

pub trait TokenRegistry {
    /// Never fails: unreadable fields fall back to `""` and the default decimals.
    fn resolve_or_create(&self, token: Address) -> TokenMetadata;
}

pub trait ChainSupplyOracle {
    /// `totalSupply()` of the token as of `block`, or `None` when the read is
    /// unavailable.
    fn current_total_supply(&self, token: Address, block: u64) -> Option<U256>;
}

/// Everything the reducer needs from storage.
pub trait Ledger: KeyedStore + AccountBalanceLedger + AccountBalanceSnapshotUpdater {}

impl<T> Ledger for T where T: KeyedStore + AccountBalanceLedger + AccountBalanceSnapshotUpdater {}

/// A backend that can apply a unit of work all-or-nothing.
pub trait Atomic: Sized {
    /// Run `f` against `self`. If it returns an error, every write made
    /// through `self` inside `f` is discarded.
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>;
}

/// A chain oracle with nothing to say: every supply read is unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct SupplyUnavailable;

impl ChainSupplyOracle for SupplyUnavailable {
    fn current_total_supply(&self, _token: Address, _block: u64) -> Option<U256> {
        None
    }
}
