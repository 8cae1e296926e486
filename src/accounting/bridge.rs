//! Cross-chain (LayerZero OFT) sends and receives.
//!
//! Bridge events only move the lzTotalBridged counters; the balance changes
//! travel with the `Transfer` logs the OFT contract emits alongside them.

use super::snapshots::Windows;
use crate::collaborators::KeyedStore;
use crate::events::LogRef;
use crate::keys::{address_hex, event_id, hash_hex};
use crate::repository::{BridgeDirection, BridgeTransferEvent, Token};
use alloy_primitives::{Address, B256, U256, hex};
use anyhow::Result;

pub fn apply_bridge_out<S: KeyedStore + ?Sized>(
    store: &mut S,
    token: &mut Token,
    amount: U256,
    sender: Address,
    receiver: B256,
    dst_chain_id: u16,
    log: &LogRef,
) -> Result<()> {
    let record = BridgeTransferEvent {
        id: event_id(&token.id, &log.tx_hash, log.log_index),
        hash: hash_hex(&log.tx_hash),
        log_index: log.log_index,
        token: token.id.clone(),
        nonce: log.nonce,
        direction: BridgeDirection::Out,
        amount,
        from: Some(address_hex(&sender)),
        to: hex::encode_prefixed(receiver.as_slice()),
        source_chain_id: None,
        destination_chain_id: Some(dst_chain_id.to_string()),
        block_number: log.block.number,
        timestamp: log.block.timestamp,
    };
    store.save_bridge_event(&record)?;

    token.lz_total_bridged_out =
        token.checked_add(token.lz_total_bridged_out, amount, "lz_total_bridged_out")?;
    token.lz_total_bridged_out_count += 1;

    let mut windows = Windows::open(&*store, token, &log.block)?;
    windows.update(token, &log.block, |s| s.record_bridge_out(amount))?;

    store.save_token(token)?;
    windows.save(store)
}

pub fn apply_bridge_in<S: KeyedStore + ?Sized>(
    store: &mut S,
    token: &mut Token,
    amount: U256,
    receiver: Address,
    src_chain_id: u16,
    log: &LogRef,
) -> Result<()> {
    let record = BridgeTransferEvent {
        id: event_id(&token.id, &log.tx_hash, log.log_index),
        hash: hash_hex(&log.tx_hash),
        log_index: log.log_index,
        token: token.id.clone(),
        nonce: log.nonce,
        direction: BridgeDirection::In,
        amount,
        from: None,
        to: address_hex(&receiver),
        source_chain_id: Some(src_chain_id.to_string()),
        destination_chain_id: None,
        block_number: log.block.number,
        timestamp: log.block.timestamp,
    };
    store.save_bridge_event(&record)?;

    token.lz_total_bridged_in =
        token.checked_add(token.lz_total_bridged_in, amount, "lz_total_bridged_in")?;
    token.lz_total_bridged_in_count += 1;

    let mut windows = Windows::open(&*store, token, &log.block)?;
    windows.update(token, &log.block, |s| s.record_bridge_in(amount))?;

    store.save_token(token)?;
    windows.save(store)
}
