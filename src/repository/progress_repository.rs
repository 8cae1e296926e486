use crate::keys::token_id;
use alloy_primitives::Address;
use anyhow::Result;
use rusqlite::{OptionalExtension, params};

/// Per-contract scan cursors.
///
/// Two cursors are kept: the last block whose logs were all fetched and
/// handled, and the position (block, log index) of the last log whose
/// effects were committed. The latter is written in the same transaction as
/// the effects, so a log is skipped after a restart even when the block
/// cursor lags behind.
pub struct ProgressRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> ProgressRepository<'a> {
    const INSERT_PROGRESS: &'static str =
        "INSERT OR IGNORE INTO scan_progress (token, start_block, last_processed_block)
         VALUES (?1, ?2, NULL)";

    const UPDATE_LAST_PROCESSED_BLOCK: &'static str =
        "UPDATE scan_progress SET last_processed_block = ?1 WHERE token = ?2";

    const GET_START_BLOCK: &'static str = "SELECT start_block FROM scan_progress WHERE token = ?1";

    const GET_LAST_PROCESSED_BLOCK: &'static str =
        "SELECT last_processed_block FROM scan_progress WHERE token = ?1";

    const MARK_APPLIED: &'static str = "INSERT INTO scan_progress
        (token, start_block, last_processed_block, last_applied_block, last_applied_log_index)
        VALUES (?1, ?2, NULL, ?2, ?3)
        ON CONFLICT(token) DO UPDATE SET
            last_applied_block = excluded.last_applied_block,
            last_applied_log_index = excluded.last_applied_log_index";

    const GET_LAST_APPLIED_LOG: &'static str =
        "SELECT last_applied_block, last_applied_log_index FROM scan_progress WHERE token = ?1";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Register a token starting at `start_block`. Existing cursors are kept.
    pub fn insert(&self, token: &Address, start_block: u64) -> Result<()> {
        self.conn
            .execute(Self::INSERT_PROGRESS, params![token_id(token), start_block])?;
        Ok(())
    }

    pub fn get_start_block(&self, token: &Address) -> Result<Option<u64>> {
        let block: Option<u64> = self
            .conn
            .query_row(Self::GET_START_BLOCK, params![token_id(token)], |row| row.get(0))
            .optional()?;
        Ok(block)
    }

    /// `None` both for unknown tokens and for tokens with nothing processed yet.
    pub fn get_last_processed_block(&self, token: &Address) -> Result<Option<u64>> {
        let block: Option<Option<u64>> = self
            .conn
            .query_row(Self::GET_LAST_PROCESSED_BLOCK, params![token_id(token)], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(block.flatten())
    }

    pub fn update_last_processed_block(&self, token: &Address, block_number: u64) -> Result<()> {
        self.conn.execute(
            Self::UPDATE_LAST_PROCESSED_BLOCK,
            params![block_number, token_id(token)],
        )?;
        Ok(())
    }

    /// Position of the last log of `token` whose effects were committed.
    pub fn last_applied_log(&self, token: &Address) -> Result<Option<(u64, u64)>> {
        let position: Option<(Option<u64>, Option<u64>)> = self
            .conn
            .query_row(Self::GET_LAST_APPLIED_LOG, params![token_id(token)], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;
        Ok(match position {
            Some((Some(block), Some(log_index))) => Some((block, log_index)),
            _ => None,
        })
    }

    pub fn mark_applied(&self, token: &Address, block_number: u64, log_index: u64) -> Result<()> {
        self.conn.execute(
            Self::MARK_APPLIED,
            params![token_id(token), block_number, log_index],
        )?;
        Ok(())
    }
}
