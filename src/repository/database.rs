use super::balance_repository::BalanceRepository;
use super::models::{AccountBalance, BridgeTransferEvent, Token, TokenSnapshot, TransferEvent};
use super::snapshot_repository::SnapshotRepository;
use super::token_repository::TokenRepository;
use super::transfer_repository::TransferRepository;
use crate::bucket::Cadence;
use crate::collaborators::{AccountBalanceLedger, AccountBalanceSnapshotUpdater, Atomic, KeyedStore};
use crate::events::BlockRef;
use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::warn;

const SNAPSHOT_COLUMNS: &str = "
    id TEXT PRIMARY KEY,
    token TEXT NOT NULL,
    bucket INTEGER NOT NULL,
    total_supply TEXT NOT NULL,
    current_holder_count INTEGER NOT NULL,
    cumulative_holder_count INTEGER NOT NULL,
    event_count INTEGER NOT NULL,
    transfer_count INTEGER NOT NULL,
    transfer_amount TEXT NOT NULL,
    mint_count INTEGER NOT NULL,
    mint_amount TEXT NOT NULL,
    burn_count INTEGER NOT NULL,
    burn_amount TEXT NOT NULL,
    lz_bridged_in_count INTEGER NOT NULL,
    lz_bridged_in TEXT NOT NULL,
    lz_bridged_out_count INTEGER NOT NULL,
    lz_bridged_out TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    timestamp INTEGER NOT NULL";

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let db_path = db_path.strip_prefix("sqlite:").unwrap_or(db_path);
        let conn = Connection::open(db_path).context("Failed to open database")?;

        let db = Database { conn };
        db.create_tables()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let db = Database { conn };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                id TEXT PRIMARY KEY,
                name TEXT,
                symbol TEXT,
                decimals INTEGER,
                total_supply TEXT NOT NULL,
                total_minted TEXT NOT NULL,
                total_burned TEXT NOT NULL,
                mint_count INTEGER NOT NULL,
                burn_count INTEGER NOT NULL,
                transfer_count INTEGER NOT NULL,
                current_holder_count INTEGER NOT NULL,
                cumulative_holder_count INTEGER NOT NULL,
                lz_total_bridged_in TEXT NOT NULL,
                lz_total_bridged_in_count INTEGER NOT NULL,
                lz_total_bridged_out TEXT NOT NULL,
                lz_total_bridged_out_count INTEGER NOT NULL
            )",
            [],
        )?;

        for cadence in Cadence::all() {
            self.conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} ({})",
                    SnapshotRepository::table(cadence),
                    SNAPSHOT_COLUMNS
                ),
                [],
            )?;
            self.conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{0}_token_bucket ON {0}(token, bucket)",
                    SnapshotRepository::table(cadence)
                ),
                [],
            )?;
        }

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS transfer_events (
                id TEXT PRIMARY KEY,
                hash TEXT NOT NULL,
                log_index INTEGER NOT NULL,
                token TEXT NOT NULL,
                nonce INTEGER NOT NULL,
                from_address TEXT NOT NULL,
                to_address TEXT NOT NULL,
                amount TEXT NOT NULL,
                block_number INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS bridge_transfer_events (
                id TEXT PRIMARY KEY,
                hash TEXT NOT NULL,
                log_index INTEGER NOT NULL,
                token TEXT NOT NULL,
                nonce INTEGER NOT NULL,
                direction TEXT NOT NULL,
                amount TEXT NOT NULL,
                from_address TEXT,
                to_address TEXT NOT NULL,
                source_chain_id TEXT,
                destination_chain_id TEXT,
                block_number INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS account_balances (
                account TEXT NOT NULL,
                token TEXT NOT NULL,
                amount TEXT NOT NULL,
                block_number INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                PRIMARY KEY (account, token)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS account_balance_daily_snapshots (
                id TEXT PRIMARY KEY,
                account TEXT NOT NULL,
                token TEXT NOT NULL,
                amount TEXT NOT NULL,
                block_number INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS scan_progress (
                token TEXT PRIMARY KEY,
                start_block INTEGER NOT NULL,
                last_processed_block INTEGER,
                last_applied_block INTEGER,
                last_applied_log_index INTEGER
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transfer_events_token_block
             ON transfer_events(token, block_number)",
            [],
        )?;

        Ok(())
    }
}

impl Atomic for Database {
    fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(&mut *self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }
}

impl KeyedStore for Database {
    fn load_token(&self, id: &str) -> Result<Option<Token>> {
        TokenRepository::new(&self.conn).load(id)
    }

    fn save_token(&mut self, token: &Token) -> Result<()> {
        TokenRepository::new(&self.conn).save(token)
    }

    fn load_snapshot(&self, cadence: Cadence, id: &str) -> Result<Option<TokenSnapshot>> {
        SnapshotRepository::new(&self.conn).load(cadence, id)
    }

    fn save_snapshot(&mut self, snapshot: &TokenSnapshot) -> Result<()> {
        SnapshotRepository::new(&self.conn).save(snapshot)
    }

    fn save_transfer_event(&mut self, event: &TransferEvent) -> Result<()> {
        TransferRepository::new(&self.conn).insert_transfer(event)
    }

    fn save_bridge_event(&mut self, event: &BridgeTransferEvent) -> Result<()> {
        TransferRepository::new(&self.conn).insert_bridge_transfer(event)
    }
}

impl AccountBalanceLedger for Database {
    fn get_or_create(&self, account: Address, token: &str) -> Result<AccountBalance> {
        BalanceRepository::new(&self.conn).get_or_create(&account, token)
    }

    fn is_new_account(&self, account: Address, token: &str) -> Result<bool> {
        Ok(!BalanceRepository::new(&self.conn).exists(&account, token)?)
    }

    fn increase(
        &mut self,
        account: Address,
        token: &str,
        amount: U256,
        block: &BlockRef,
    ) -> Result<AccountBalance> {
        BalanceRepository::new(&self.conn).increase(&account, token, amount, block)
    }

    fn decrease(
        &mut self,
        account: Address,
        token: &str,
        amount: U256,
        block: &BlockRef,
    ) -> Result<AccountBalance> {
        BalanceRepository::new(&self.conn).decrease(&account, token, amount, block)
    }
}

impl AccountBalanceSnapshotUpdater for Database {
    fn on_balance_changed(&mut self, balance: &AccountBalance, block: &BlockRef) -> Result<()> {
        BalanceRepository::new(&self.conn).upsert_daily_snapshot(balance, block)
    }
}
