use crate::bucket::{Cadence, snapshot_id};
use crate::error::AccountingError;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Name, symbol and decimals as resolved from the token contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub total_supply: U256,
    pub total_minted: U256,
    pub total_burned: U256,
    pub mint_count: u64,
    pub burn_count: u64,
    pub transfer_count: u64,
    pub current_holder_count: i64,
    pub cumulative_holder_count: u64,
    pub lz_total_bridged_in: U256,
    pub lz_total_bridged_in_count: u64,
    pub lz_total_bridged_out: U256,
    pub lz_total_bridged_out_count: u64,
}

impl Token {
    pub fn new(id: String) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.name.is_some()
    }

    pub fn apply_metadata(&mut self, metadata: TokenMetadata) {
        self.name = Some(metadata.name);
        self.symbol = Some(metadata.symbol);
        self.decimals = Some(metadata.decimals);
    }

    pub(crate) fn checked_add(
        &self,
        lhs: U256,
        rhs: U256,
        field: &'static str,
    ) -> Result<U256, AccountingError> {
        lhs.checked_add(rhs).ok_or_else(|| AccountingError::AmountOverflow {
            token: self.id.clone(),
            field,
        })
    }
}

/// Per-bucket rollup of one token. Cumulative fields mirror the token at the
/// last write; the remaining counters are local to the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub id: String,
    pub token: String,
    pub cadence: Cadence,
    pub bucket: u64,

    pub total_supply: U256,
    pub current_holder_count: i64,
    pub cumulative_holder_count: u64,

    pub event_count: u64,
    pub transfer_count: u64,
    pub transfer_amount: U256,
    pub mint_count: u64,
    pub mint_amount: U256,
    pub burn_count: u64,
    pub burn_amount: U256,
    pub lz_bridged_in_count: u64,
    pub lz_bridged_in: U256,
    pub lz_bridged_out_count: u64,
    pub lz_bridged_out: U256,

    pub block_number: u64,
    pub timestamp: u64,
}

impl TokenSnapshot {
    /// Fresh bucket: counters zeroed, cumulative state carried over from the token.
    pub fn open(token: &Token, cadence: Cadence, bucket: u64, block_number: u64, timestamp: u64) -> Self {
        Self {
            id: snapshot_id(&token.id, bucket),
            token: token.id.clone(),
            cadence,
            bucket,
            total_supply: token.total_supply,
            current_holder_count: token.current_holder_count,
            cumulative_holder_count: token.cumulative_holder_count,
            event_count: 0,
            transfer_count: 0,
            transfer_amount: U256::ZERO,
            mint_count: 0,
            mint_amount: U256::ZERO,
            burn_count: 0,
            burn_amount: U256::ZERO,
            lz_bridged_in_count: 0,
            lz_bridged_in: U256::ZERO,
            lz_bridged_out_count: 0,
            lz_bridged_out: U256::ZERO,
            block_number,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub id: String,
    pub hash: String,
    pub log_index: u64,
    pub token: String,
    pub nonce: u64,
    pub from: String,
    pub to: String,
    pub amount: U256,
    pub block_number: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeDirection {
    In,
    Out,
}

impl BridgeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeDirection::In => "in",
            BridgeDirection::Out => "out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(BridgeDirection::In),
            "out" => Some(BridgeDirection::Out),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTransferEvent {
    pub id: String,
    pub hash: String,
    pub log_index: u64,
    pub token: String,
    pub nonce: u64,
    pub direction: BridgeDirection,
    pub amount: U256,
    /// Sender on this chain; only known for outbound transfers.
    pub from: Option<String>,
    pub to: String,
    pub source_chain_id: Option<String>,
    pub destination_chain_id: Option<String>,
    pub block_number: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: String,
    pub token: String,
    pub amount: U256,
    pub block_number: u64,
    pub timestamp: u64,
}

impl AccountBalance {
    pub fn zero(account: String, token: String) -> Self {
        Self {
            account,
            token,
            amount: U256::ZERO,
            block_number: 0,
            timestamp: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalanceDailySnapshot {
    pub id: String,
    pub account: String,
    pub token: String,
    pub amount: U256,
    pub block_number: u64,
    pub timestamp: u64,
}
