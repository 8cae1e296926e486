use super::codec::{amount_column, pad_amount};
use super::models::{AccountBalance, AccountBalanceDailySnapshot};
use crate::error::AccountingError;
use crate::events::BlockRef;
use crate::keys::{address_hex, balance_snapshot_id};
use alloy_primitives::{Address, U256};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::warn;

pub struct BalanceRepository<'a> {
    conn: &'a Connection,
}

impl<'a> BalanceRepository<'a> {
    const SELECT_BALANCE: &'static str =
        "SELECT * FROM account_balances WHERE account = ?1 AND token = ?2";

    const UPSERT_BALANCE: &'static str = "INSERT OR REPLACE INTO account_balances
        (account, token, amount, block_number, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)";

    const UPSERT_DAILY_SNAPSHOT: &'static str = "INSERT OR REPLACE INTO account_balance_daily_snapshots
        (id, account, token, amount, block_number, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

    const SELECT_DAILY_SNAPSHOTS: &'static str = "SELECT * FROM account_balance_daily_snapshots
        WHERE account = ?1 AND token = ?2 ORDER BY timestamp";

    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn find(&self, account: &Address, token: &str) -> Result<Option<AccountBalance>> {
        let balance = self
            .conn
            .query_row(
                Self::SELECT_BALANCE,
                params![address_hex(account), token],
                Self::row_to_balance,
            )
            .optional()?;
        Ok(balance)
    }

    pub fn exists(&self, account: &Address, token: &str) -> Result<bool> {
        Ok(self.find(account, token)?.is_some())
    }

    /// Stored balance, or an unsaved zero balance.
    pub fn get_or_create(&self, account: &Address, token: &str) -> Result<AccountBalance> {
        Ok(self
            .find(account, token)?
            .unwrap_or_else(|| AccountBalance::zero(address_hex(account), token.to_string())))
    }

    pub fn increase(
        &self,
        account: &Address,
        token: &str,
        amount: U256,
        block: &BlockRef,
    ) -> Result<AccountBalance> {
        let mut balance = self.get_or_create(account, token)?;
        balance.amount = balance
            .amount
            .checked_add(amount)
            .ok_or_else(|| AccountingError::AmountOverflow {
                token: token.to_string(),
                field: "account_balance",
            })?;
        balance.block_number = block.number;
        balance.timestamp = block.timestamp;
        self.save(&balance)?;
        Ok(balance)
    }

    /// Subtract, clamping at zero. Accounts without a record stay without one.
    pub fn decrease(
        &self,
        account: &Address,
        token: &str,
        amount: U256,
        block: &BlockRef,
    ) -> Result<AccountBalance> {
        let Some(mut balance) = self.find(account, token)? else {
            warn!(
                "Decrease of {} for {} on {} without a balance record",
                amount,
                address_hex(account),
                token
            );
            return Ok(AccountBalance::zero(address_hex(account), token.to_string()));
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
        self.save(&balance)?;
        Ok(balance)
    }

    /// Copy the balance into its daily snapshot row, keyed by the block's day.
    pub fn upsert_daily_snapshot(&self, balance: &AccountBalance, block: &BlockRef) -> Result<()> {
        self.conn.execute(
            Self::UPSERT_DAILY_SNAPSHOT,
            params![
                balance_snapshot_id(&balance.account, &balance.token, block.timestamp),
                balance.account,
                balance.token,
                pad_amount(&balance.amount),
                block.number,
                block.timestamp,
            ],
        )?;
        Ok(())
    }

    pub fn daily_snapshots(
        &self,
        account: &Address,
        token: &str,
    ) -> Result<Vec<AccountBalanceDailySnapshot>> {
        let mut stmt = self.conn.prepare(Self::SELECT_DAILY_SNAPSHOTS)?;
        let snapshots = stmt
            .query_map(params![address_hex(account), token], |row| {
                Ok(AccountBalanceDailySnapshot {
                    id: row.get("id")?,
                    account: row.get("account")?,
                    token: row.get("token")?,
                    amount: amount_column(row, "amount")?,
                    block_number: row.get("block_number")?,
                    timestamp: row.get("timestamp")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    fn save(&self, balance: &AccountBalance) -> Result<()> {
        self.conn.execute(
            Self::UPSERT_BALANCE,
            params![
                balance.account,
                balance.token,
                pad_amount(&balance.amount),
                balance.block_number,
                balance.timestamp,
            ],
        )?;
        Ok(())
    }

    fn row_to_balance(row: &Row) -> rusqlite::Result<AccountBalance> {
        Ok(AccountBalance {
            account: row.get("account")?,
            token: row.get("token")?,
            amount: amount_column(row, "amount")?,
            block_number: row.get("block_number")?,
            timestamp: row.get("timestamp")?,
        })
    }
}
