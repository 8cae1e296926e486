use super::codec::{amount_column, pad_amount};
use super::models::{BridgeDirection, BridgeTransferEvent, TransferEvent};
use anyhow::Result;
use rusqlite::{Row, params};

pub struct TransferRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> TransferRepository<'a> {
    // Both event tables are write-once
    const INSERT_TRANSFER: &'static str = "INSERT OR IGNORE INTO transfer_events (
            id, hash, log_index, token, nonce,
            from_address, to_address, amount, block_number, timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

    const INSERT_BRIDGE_TRANSFER: &'static str = "INSERT OR IGNORE INTO bridge_transfer_events (
            id, hash, log_index, token, nonce, direction, amount,
            from_address, to_address, source_chain_id, destination_chain_id,
            block_number, timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

    const SELECT_TRANSFERS_FOR_TOKEN: &'static str = "SELECT * FROM transfer_events
        WHERE token = ?1 ORDER BY block_number, log_index";

    const SELECT_BRIDGE_TRANSFERS_FOR_TOKEN: &'static str = "SELECT * FROM bridge_transfer_events
        WHERE token = ?1 ORDER BY block_number, log_index";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn insert_transfer(&self, event: &TransferEvent) -> Result<()> {
        self.conn.execute(
            Self::INSERT_TRANSFER,
            params![
                event.id,
                event.hash,
                event.log_index,
                event.token,
                event.nonce,
                event.from,
                event.to,
                pad_amount(&event.amount),
                event.block_number,
                event.timestamp,
            ],
        )?;
        Ok(())
    }

    pub fn insert_bridge_transfer(&self, event: &BridgeTransferEvent) -> Result<()> {
        self.conn.execute(
            Self::INSERT_BRIDGE_TRANSFER,
            params![
                event.id,
                event.hash,
                event.log_index,
                event.token,
                event.nonce,
                event.direction.as_str(),
                pad_amount(&event.amount),
                event.from,
                event.to,
                event.source_chain_id,
                event.destination_chain_id,
                event.block_number,
                event.timestamp,
            ],
        )?;
        Ok(())
    }

    pub fn transfers_for_token(&self, token: &str) -> Result<Vec<TransferEvent>> {
        let mut stmt = self.conn.prepare(Self::SELECT_TRANSFERS_FOR_TOKEN)?;
        let events = stmt
            .query_map(params![token], Self::row_to_transfer)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    pub fn bridge_transfers_for_token(&self, token: &str) -> Result<Vec<BridgeTransferEvent>> {
        let mut stmt = self.conn.prepare(Self::SELECT_BRIDGE_TRANSFERS_FOR_TOKEN)?;
        let events = stmt
            .query_map(params![token], Self::row_to_bridge_transfer)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn row_to_transfer(row: &Row) -> rusqlite::Result<TransferEvent> {
        Ok(TransferEvent {
            id: row.get("id")?,
            hash: row.get("hash")?,
            log_index: row.get("log_index")?,
            token: row.get("token")?,
            nonce: row.get("nonce")?,
            from: row.get("from_address")?,
            to: row.get("to_address")?,
            amount: amount_column(row, "amount")?,
            block_number: row.get("block_number")?,
            timestamp: row.get("timestamp")?,
        })
    }

    fn row_to_bridge_transfer(row: &Row) -> rusqlite::Result<BridgeTransferEvent> {
        let direction: String = row.get("direction")?;
        let direction = BridgeDirection::parse(&direction).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                row.as_ref().column_index("direction").unwrap_or_default(),
                rusqlite::types::Type::Text,
                format!("Unknown bridge direction: {direction}").into(),
            )
        })?;

        Ok(BridgeTransferEvent {
            id: row.get("id")?,
            hash: row.get("hash")?,
            log_index: row.get("log_index")?,
            token: row.get("token")?,
            nonce: row.get("nonce")?,
            direction,
            amount: amount_column(row, "amount")?,
            from: row.get("from_address")?,
            to: row.get("to_address")?,
            source_chain_id: row.get("source_chain_id")?,
            destination_chain_id: row.get("destination_chain_id")?,
            block_number: row.get("block_number")?,
            timestamp: row.get("timestamp")?,
        })
    }
}
