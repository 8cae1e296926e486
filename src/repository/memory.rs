//! In-process ledger backed by hash maps.
//!
//! Implements the same traits as [`Database`](super::Database), so the
//! accounting core can be driven without SQLite. Atomicity is a snapshot of
//! the whole ledger taken before the unit of work and restored on error.

use super::models::{
    AccountBalance, AccountBalanceDailySnapshot, BridgeTransferEvent, Token, TokenSnapshot, TransferEvent,
};
use crate::bucket::Cadence;
use crate::collaborators::{AccountBalanceLedger, AccountBalanceSnapshotUpdater, Atomic, KeyedStore};
use crate::error::AccountingError;
use crate::events::BlockRef;
use crate::keys::{address_hex, balance_id, balance_snapshot_id};
use alloy_primitives::{Address, U256};
use anyhow::Result;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    tokens: HashMap<String, Token>,
    daily_snapshots: HashMap<String, TokenSnapshot>,
    hourly_snapshots: HashMap<String, TokenSnapshot>,
    transfer_events: HashMap<String, TransferEvent>,
    bridge_events: HashMap<String, BridgeTransferEvent>,
    balances: HashMap<String, AccountBalance>,
    balance_snapshots: HashMap<String, AccountBalanceDailySnapshot>,
}

impl MemoryLedger {
    pub fn token(&self, id: &str) -> Option<&Token> {
        self.tokens.get(id)
    }

    pub fn snapshot(&self, cadence: Cadence, id: &str) -> Option<&TokenSnapshot> {
        self.snapshots(cadence).get(id)
    }

    pub fn transfer_event(&self, id: &str) -> Option<&TransferEvent> {
        self.transfer_events.get(id)
    }

    pub fn transfer_event_count(&self) -> usize {
        self.transfer_events.len()
    }

    pub fn bridge_event(&self, id: &str) -> Option<&BridgeTransferEvent> {
        self.bridge_events.get(id)
    }

    pub fn bridge_event_count(&self) -> usize {
        self.bridge_events.len()
    }

    /// Current balance; zero when the account has no record.
    pub fn balance(&self, account: Address, token: &str) -> U256 {
        self.balances
            .get(&balance_id(&account, token))
            .map(|b| b.amount)
            .unwrap_or_default()
    }

    pub fn has_balance_record(&self, account: Address, token: &str) -> bool {
        self.balances.contains_key(&balance_id(&account, token))
    }

    pub fn balance_snapshot(&self, id: &str) -> Option<&AccountBalanceDailySnapshot> {
        self.balance_snapshots.get(id)
    }

    fn snapshots(&self, cadence: Cadence) -> &HashMap<String, TokenSnapshot> {
        match cadence {
            Cadence::Daily => &self.daily_snapshots,
            Cadence::Hourly => &self.hourly_snapshots,
        }
    }

    fn snapshots_mut(&mut self, cadence: Cadence) -> &mut HashMap<String, TokenSnapshot> {
        match cadence {
            Cadence::Daily => &mut self.daily_snapshots,
            Cadence::Hourly => &mut self.hourly_snapshots,
        }
    }
}

impl Atomic for MemoryLedger {
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let checkpoint = self.clone();
        let result = f(&mut *self);
        if result.is_err() {
            *self = checkpoint;
        }
        result
    }
}

impl KeyedStore for MemoryLedger {
    fn load_token(&self, id: &str) -> Result<Option<Token>> {
        Ok(self.tokens.get(id).cloned())
    }

    fn save_token(&mut self, token: &Token) -> Result<()> {
        self.tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    fn load_snapshot(&self, cadence: Cadence, id: &str) -> Result<Option<TokenSnapshot>> {
        Ok(self.snapshots(cadence).get(id).cloned())
    }

    fn save_snapshot(&mut self, snapshot: &TokenSnapshot) -> Result<()> {
        self.snapshots_mut(snapshot.cadence)
            .insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    fn save_transfer_event(&mut self, event: &TransferEvent) -> Result<()> {
        self.transfer_events
            .entry(event.id.clone())
            .or_insert_with(|| event.clone());
        Ok(())
    }

    fn save_bridge_event(&mut self, event: &BridgeTransferEvent) -> Result<()> {
        self.bridge_events
            .entry(event.id.clone())
            .or_insert_with(|| event.clone());
        Ok(())
    }
}

impl AccountBalanceLedger for MemoryLedger {
    fn get_or_create(&self, account: Address, token: &str) -> Result<AccountBalance> {
        Ok(self
            .balances
            .get(&balance_id(&account, token))
            .cloned()
            .unwrap_or_else(|| AccountBalance::zero(address_hex(&account), token.to_string())))
    }

    fn is_new_account(&self, account: Address, token: &str) -> Result<bool> {
        Ok(!self.has_balance_record(account, token))
    }

    fn increase(
        &mut self,
        account: Address,
        token: &str,
        amount: U256,
        block: &BlockRef,
    ) -> Result<AccountBalance> {
        let balance = self
            .balances
            .entry(balance_id(&account, token))
            .or_insert_with(|| AccountBalance::zero(address_hex(&account), token.to_string()));
        balance.amount = balance
            .amount
            .checked_add(amount)
            .ok_or_else(|| AccountingError::AmountOverflow {
                token: token.to_string(),
                field: "account_balance",
            })?;
        balance.block_number = block.number;
        balance.timestamp = block.timestamp;
        Ok(balance.clone())
    }

    fn decrease(
        &mut self,
        account: Address,
        token: &str,
        amount: U256,
        block: &BlockRef,
    ) -> Result<AccountBalance> {
        let Some(balance) = self.balances.get_mut(&balance_id(&account, token)) else {
            warn!(
                "Decrease of {} for {} on {} without a balance record",
                amount,
                address_hex(&account),
                token
            );
            return Ok(AccountBalance::zero(address_hex(&account), token.to_string()));
        };

        if balance.amount < amount {
            warn!(
                "Balance of {} on {} would go negative ({} - {}), clamping to zero",
                balance.account, token, balance.amount, amount
            );
        }
        balance.amount = balance.amount.saturating_sub(amount);
        balance.block_number = block.number;
        balance.timestamp = block.timestamp;
        Ok(balance.clone())
    }
}

impl AccountBalanceSnapshotUpdater for MemoryLedger {
    fn on_balance_changed(&mut self, balance: &AccountBalance, block: &BlockRef) -> Result<()> {
        let id = balance_snapshot_id(&balance.account, &balance.token, block.timestamp);
        self.balance_snapshots.insert(
            id.clone(),
            AccountBalanceDailySnapshot {
                id,
                account: balance.account.clone(),
                token: balance.token.clone(),
                amount: balance.amount,
                block_number: block.number,
                timestamp: block.timestamp,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const TOKEN: &str = "0x9e20461bc2c4c980f62f1b279d71734207a6a356";
    const ALICE: Address = address!("1111111111111111111111111111111111111111");
    const BLOCK: BlockRef = BlockRef {
        number: 1,
        timestamp: 10,
    };

    #[test]
    fn test_failed_unit_of_work_is_rolled_back() {
        let mut ledger = MemoryLedger::default();
        ledger.increase(ALICE, TOKEN, U256::from(5u64), &BLOCK).unwrap();

        let result: Result<()> = ledger.atomically(|l| {
            l.increase(ALICE, TOKEN, U256::from(10u64), &BLOCK)?;
            l.save_token(&Token::new(TOKEN.to_string()))?;
            anyhow::bail!("boom")
        });

        assert!(result.is_err());
        assert_eq!(ledger.balance(ALICE, TOKEN), U256::from(5u64));
        assert!(ledger.token(TOKEN).is_none());
    }

    #[test]
    fn test_increase_overflow_is_an_error() {
        let mut ledger = MemoryLedger::default();
        ledger.increase(ALICE, TOKEN, U256::MAX, &BLOCK).unwrap();
        let err = ledger.increase(ALICE, TOKEN, U256::from(1u64), &BLOCK).unwrap_err();
        assert!(err.downcast_ref::<AccountingError>().is_some());
    }
}
