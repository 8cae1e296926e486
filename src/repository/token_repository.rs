use super::codec::{amount_column, pad_amount};
use super::models::Token;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};

pub struct TokenRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> TokenRepository<'a> {
    // SQL queries as constants for better maintainability
    const UPSERT_TOKEN: &'static str = "INSERT OR REPLACE INTO tokens (
            id, name, symbol, decimals,
            total_supply, total_minted, total_burned,
            mint_count, burn_count, transfer_count,
            current_holder_count, cumulative_holder_count,
            lz_total_bridged_in, lz_total_bridged_in_count,
            lz_total_bridged_out, lz_total_bridged_out_count
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)";

    const SELECT_TOKEN: &'static str = "SELECT * FROM tokens WHERE id = ?1";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn load(&self, id: &str) -> Result<Option<Token>> {
        let token = self
            .conn
            .query_row(Self::SELECT_TOKEN, params![id], Self::row_to_token)
            .optional()?;
        Ok(token)
    }

    pub fn save(&self, token: &Token) -> Result<()> {
        self.conn.execute(
            Self::UPSERT_TOKEN,
            params![
                token.id,
                token.name,
                token.symbol,
                token.decimals,
                pad_amount(&token.total_supply),
                pad_amount(&token.total_minted),
                pad_amount(&token.total_burned),
                token.mint_count,
                token.burn_count,
                token.transfer_count,
                token.current_holder_count,
                token.cumulative_holder_count,
                pad_amount(&token.lz_total_bridged_in),
                token.lz_total_bridged_in_count,
                pad_amount(&token.lz_total_bridged_out),
                token.lz_total_bridged_out_count,
            ],
        )?;
        Ok(())
    }

    fn row_to_token(row: &Row) -> rusqlite::Result<Token> {
        Ok(Token {
            id: row.get("id")?,
            name: row.get("name")?,
            symbol: row.get("symbol")?,
            decimals: row.get("decimals")?,
            total_supply: amount_column(row, "total_supply")?,
            total_minted: amount_column(row, "total_minted")?,
            total_burned: amount_column(row, "total_burned")?,
            mint_count: row.get("mint_count")?,
            burn_count: row.get("burn_count")?,
            transfer_count: row.get("transfer_count")?,
            current_holder_count: row.get("current_holder_count")?,
            cumulative_holder_count: row.get("cumulative_holder_count")?,
            lz_total_bridged_in: amount_column(row, "lz_total_bridged_in")?,
            lz_total_bridged_in_count: row.get("lz_total_bridged_in_count")?,
            lz_total_bridged_out: amount_column(row, "lz_total_bridged_out")?,
            lz_total_bridged_out_count: row.get("lz_total_bridged_out_count")?,
        })
    }
}
