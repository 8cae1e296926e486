use super::codec::{amount_column, pad_amount};
use super::models::TokenSnapshot;
use crate::bucket::Cadence;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};

pub struct SnapshotRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> SnapshotRepository<'a> {
    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn table(cadence: Cadence) -> &'static str {
        match cadence {
            Cadence::Daily => "token_daily_snapshots",
            Cadence::Hourly => "token_hourly_snapshots",
        }
    }

    pub fn load(&self, cadence: Cadence, id: &str) -> Result<Option<TokenSnapshot>> {
        let query = format!("SELECT * FROM {} WHERE id = ?1", Self::table(cadence));
        let snapshot = self
            .conn
            .query_row(&query, params![id], |row| Self::row_to_snapshot(row, cadence))
            .optional()?;
        Ok(snapshot)
    }

    /// Snapshots of a token in bucket order.
    pub fn list_for_token(&self, cadence: Cadence, token: &str) -> Result<Vec<TokenSnapshot>> {
        let query = format!(
            "SELECT * FROM {} WHERE token = ?1 ORDER BY bucket",
            Self::table(cadence)
        );
        let mut stmt = self.conn.prepare(&query)?;
        let snapshots = stmt
            .query_map(params![token], |row| Self::row_to_snapshot(row, cadence))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    pub fn save(&self, snapshot: &TokenSnapshot) -> Result<()> {
        let query = format!(
            "INSERT OR REPLACE INTO {} (
                id, token, bucket,
                total_supply, current_holder_count, cumulative_holder_count,
                event_count, transfer_count, transfer_amount,
                mint_count, mint_amount, burn_count, burn_amount,
                lz_bridged_in_count, lz_bridged_in, lz_bridged_out_count, lz_bridged_out,
                block_number, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            Self::table(snapshot.cadence)
        );
        self.conn.execute(
            &query,
            params![
                snapshot.id,
                snapshot.token,
                snapshot.bucket,
                pad_amount(&snapshot.total_supply),
                snapshot.current_holder_count,
                snapshot.cumulative_holder_count,
                snapshot.event_count,
                snapshot.transfer_count,
                pad_amount(&snapshot.transfer_amount),
                snapshot.mint_count,
                pad_amount(&snapshot.mint_amount),
                snapshot.burn_count,
                pad_amount(&snapshot.burn_amount),
                snapshot.lz_bridged_in_count,
                pad_amount(&snapshot.lz_bridged_in),
                snapshot.lz_bridged_out_count,
                pad_amount(&snapshot.lz_bridged_out),
                snapshot.block_number,
                snapshot.timestamp,
            ],
        )?;
        Ok(())
    }

    fn row_to_snapshot(row: &Row, cadence: Cadence) -> rusqlite::Result<TokenSnapshot> {
        Ok(TokenSnapshot {
            id: row.get("id")?,
            token: row.get("token")?,
            cadence,
            bucket: row.get("bucket")?,
            total_supply: amount_column(row, "total_supply")?,
            current_holder_count: row.get("current_holder_count")?,
            cumulative_holder_count: row.get("cumulative_holder_count")?,
            event_count: row.get("event_count")?,
            transfer_count: row.get("transfer_count")?,
            transfer_amount: amount_column(row, "transfer_amount")?,
            mint_count: row.get("mint_count")?,
            mint_amount: amount_column(row, "mint_amount")?,
            burn_count: row.get("burn_count")?,
            burn_amount: amount_column(row, "burn_amount")?,
            lz_bridged_in_count: row.get("lz_bridged_in_count")?,
            lz_bridged_in: amount_column(row, "lz_bridged_in")?,
            lz_bridged_out_count: row.get("lz_bridged_out_count")?,
            lz_bridged_out: amount_column(row, "lz_bridged_out")?,
            block_number: row.get("block_number")?,
            timestamp: row.get("timestamp")?,
        })
    }
}
