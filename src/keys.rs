//! Entity key formats.
//!
//! These strings are what downstream consumers join on, so they stay stable:
//! lowercase `0x` hex for addresses and hashes, `-` as the separator.

use crate::bucket::daily_bucket;
use alloy_primitives::{Address, B256, hex};

pub fn address_hex(address: &Address) -> String {
    hex::encode_prefixed(address.as_slice())
}

/// Lowercase hex address, the key of a `Token`.
pub fn token_id(address: &Address) -> String {
    address_hex(address)
}

pub fn hash_hex(hash: &B256) -> String {
    hex::encode_prefixed(hash.as_slice())
}

/// `"<tokenAddress>-<txHash>-<logIndex>"` for transfer and bridge events.
pub fn event_id(token_id: &str, tx_hash: &B256, log_index: u64) -> String {
    format!("{}-{}-{}", token_id, hash_hex(tx_hash), log_index)
}

/// `"<account>-<tokenAddress>"`
pub fn balance_id(account: &Address, token_id: &str) -> String {
    format!("{}-{}", address_hex(account), token_id)
}

/// `"<account>-<tokenAddress>-<day>"`
pub fn balance_snapshot_id(account: &str, token_id: &str, timestamp: u64) -> String {
    format!("{}-{}-{}", account, token_id, daily_bucket(timestamp))
}
