//! Event-to-aggregate reduction.
//!
//! [`Accountant::process`] takes one decoded log through the whole pipeline:
//!
//! ```text
//! classify -> guard (mint/burn) -> holder deltas -> mutate Token
//!          -> daily + hourly snapshots -> persist -> balances -> balance hook
//! ```
//!
//! [`Accountant::apply_event`] runs the same pipeline inside
//! [`Atomic::atomically`], so a failing event leaves no trace in storage.

pub mod bridge;
pub mod guard;
pub mod holders;
pub mod snapshots;

use crate::classifier::{ClassifiedEvent, EventKind, classify};
use crate::collaborators::{Atomic, ChainSupplyOracle, KeyedStore, Ledger, TokenRegistry};
use crate::error::AccountingError;
use crate::events::{BlockRef, LogRef, TokenEvent, TokenEventKind};
use crate::keys::{address_hex, event_id, hash_hex, token_id};
use crate::repository::{AccountBalance, Token, TransferEvent};
use alloy_primitives::{Address, U256};
use anyhow::Result;
use holders::HolderDelta;
use snapshots::Windows;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied(EventKind),
    /// Twin of an already applied mint/burn; absorbed without writes.
    AlreadyApplied(EventKind),
    /// Zero amount; nothing touched.
    Discarded,
}

/// Result of `apply_mint` / `apply_burn`. On `Skipped` the caller must not
/// adjust balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Confirmed,
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct Accountant {
    /// Bridge proxy contract -> token it bridges.
    bridge_aliases: HashMap<Address, Address>,
}

impl Accountant {
    pub fn new(bridge_aliases: HashMap<Address, Address>) -> Self {
        Self { bridge_aliases }
    }

    /// Address the event is accounted against. Bridge events emitted by a
    /// proxy are booked on the token it stands for.
    pub fn accounted_token(&self, event: &TokenEvent) -> Address {
        match event.kind {
            TokenEventKind::SendToChain { .. } | TokenEventKind::ReceiveFromChain { .. } => self
                .bridge_aliases
                .get(&event.log.token)
                .copied()
                .unwrap_or(event.log.token),
            _ => event.log.token,
        }
    }

    /// Process one event as a single all-or-nothing unit of work.
    pub fn apply_event<B: Atomic + Ledger>(
        &self,
        backend: &mut B,
        registry: &dyn TokenRegistry,
        oracle: &dyn ChainSupplyOracle,
        event: &TokenEvent,
    ) -> Result<Outcome> {
        backend.atomically(|ledger| self.process(ledger, registry, oracle, event))
    }

    pub fn process<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        registry: &dyn TokenRegistry,
        oracle: &dyn ChainSupplyOracle,
        event: &TokenEvent,
    ) -> Result<Outcome> {
        let Some(classified) = classify(&event.kind) else {
            debug!(
                "Discarding zero-amount log {}:{}",
                hash_hex(&event.log.tx_hash),
                event.log.log_index
            );
            return Ok(Outcome::Discarded);
        };

        let kind = classified.kind();
        let address = self.accounted_token(event);
        let mut token = load_token(&*ledger, registry, address)?;
        let block = &event.log.block;

        match classified {
            ClassifiedEvent::Mint {
                destination,
                amount,
            } => {
                if self.apply_mint(ledger, oracle, &mut token, amount, destination, block)?
                    == Applied::Skipped
                {
                    return Ok(Outcome::AlreadyApplied(kind));
                }
                let balance = ledger.increase(destination, &token.id, amount, block)?;
                notify_balance_changed(ledger, &balance, block);
            }
            ClassifiedEvent::Burn { burner, amount } => {
                if self.apply_burn(ledger, oracle, &mut token, amount, burner, block)?
                    == Applied::Skipped
                {
                    return Ok(Outcome::AlreadyApplied(kind));
                }
                let balance = ledger.decrease(burner, &token.id, amount, block)?;
                notify_balance_changed(ledger, &balance, block);
            }
            ClassifiedEvent::Transfer {
                source,
                destination,
                amount,
            } => {
                self.apply_transfer(ledger, &mut token, amount, source, destination, &event.log)?;

                let balance = ledger.decrease(source, &token.id, amount, block)?;
                notify_balance_changed(ledger, &balance, block);
                let balance = ledger.increase(destination, &token.id, amount, block)?;
                notify_balance_changed(ledger, &balance, block);
            }
            ClassifiedEvent::BridgeOut {
                sender,
                receiver,
                amount,
                dst_chain_id,
            } => {
                bridge::apply_bridge_out(
                    ledger,
                    &mut token,
                    amount,
                    sender,
                    receiver,
                    dst_chain_id,
                    &event.log,
                )?;
            }
            ClassifiedEvent::BridgeIn {
                receiver,
                amount,
                src_chain_id,
            } => {
                bridge::apply_bridge_in(ledger, &mut token, amount, receiver, src_chain_id, &event.log)?;
            }
        }

        debug!(
            "Applied {} at block {} to token {}",
            kind.as_str(),
            block.number,
            token.id
        );
        Ok(Outcome::Applied(kind))
    }

    /// Book a mint on the token and both snapshot windows. The caller
    /// increases the destination balance afterwards unless `Skipped`.
    pub fn apply_mint<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        oracle: &dyn ChainSupplyOracle,
        token: &mut Token,
        amount: U256,
        destination: Address,
        block: &BlockRef,
    ) -> Result<Applied> {
        let address = token_address(token)?;
        if guard::already_reflected(oracle, address, token, block.number) {
            debug!(
                "Mint of {} on {} at block {} already reflected in supply, skipping",
                amount, token.id, block.number
            );
            return Ok(Applied::Skipped);
        }

        let holders = HolderDelta::for_mint(&*ledger, &token.id, destination)?;

        token.total_supply = token.checked_add(token.total_supply, amount, "total_supply")?;
        token.total_minted = token.checked_add(token.total_minted, amount, "total_minted")?;
        token.mint_count += 1;
        holders.apply(token)?;

        let mut windows = Windows::open(&*ledger, token, block)?;
        windows.update(token, block, |s| s.record_mint(amount))?;

        ledger.save_token(token)?;
        windows.save(ledger)?;
        Ok(Applied::Confirmed)
    }

    /// Book a burn. The caller decreases the burner's balance afterwards
    /// unless `Skipped`.
    pub fn apply_burn<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        oracle: &dyn ChainSupplyOracle,
        token: &mut Token,
        amount: U256,
        burner: Address,
        block: &BlockRef,
    ) -> Result<Applied> {
        let address = token_address(token)?;
        if guard::already_reflected(oracle, address, token, block.number) {
            debug!(
                "Burn of {} on {} at block {} already reflected in supply, skipping",
                amount, token.id, block.number
            );
            return Ok(Applied::Skipped);
        }

        let holders = HolderDelta::for_burn(&*ledger, &token.id, burner, amount)?;

        token.total_supply = token.total_supply.checked_sub(amount).ok_or_else(|| {
            AccountingError::SupplyUnderflow {
                token: token.id.clone(),
                supply: token.total_supply,
                amount,
            }
        })?;
        token.total_burned = token.checked_add(token.total_burned, amount, "total_burned")?;
        token.burn_count += 1;
        holders.apply(token)?;

        let mut windows = Windows::open(&*ledger, token, block)?;
        windows.update(token, block, |s| s.record_burn(amount))?;

        ledger.save_token(token)?;
        windows.save(ledger)?;
        Ok(Applied::Confirmed)
    }

    /// Record the transfer and book it on the token and both snapshot
    /// windows. The caller moves the balances afterwards: source first.
    pub fn apply_transfer<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        token: &mut Token,
        amount: U256,
        source: Address,
        destination: Address,
        log: &LogRef,
    ) -> Result<()> {
        ledger.save_transfer_event(&TransferEvent {
            id: event_id(&token.id, &log.tx_hash, log.log_index),
            hash: hash_hex(&log.tx_hash),
            log_index: log.log_index,
            token: token.id.clone(),
            nonce: log.nonce,
            from: address_hex(&source),
            to: address_hex(&destination),
            amount,
            block_number: log.block.number,
            timestamp: log.block.timestamp,
        })?;

        let holders = HolderDelta::for_transfer(&*ledger, &token.id, source, destination, amount)?;

        token.transfer_count += 1;
        holders.apply(token)?;

        let mut windows = Windows::open(&*ledger, token, &log.block)?;
        windows.update(token, &log.block, |s| s.record_transfer(amount))?;

        ledger.save_token(token)?;
        windows.save(ledger)?;
        Ok(())
    }
}

/// Load the token, creating it (and resolving its metadata) on first sight.
pub fn load_token<S: KeyedStore + ?Sized>(
    store: &S,
    registry: &dyn TokenRegistry,
    address: Address,
) -> Result<Token> {
    let id = token_id(&address);
    let mut token = match store.load_token(&id)? {
        Some(token) => token,
        None => Token::new(id),
    };

    if !token.is_resolved() {
        let metadata = registry.resolve_or_create(address);
        info!(
            "Tracking token {} ({} / {}, {} decimals)",
            token.id, metadata.name, metadata.symbol, metadata.decimals
        );
        token.apply_metadata(metadata);
    }

    Ok(token)
}

fn token_address(token: &Token) -> Result<Address> {
    token
        .id
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid token id: {}", token.id))
}

/// The balance snapshot hook is fire-and-forget: a failure is logged and
/// does not abort the event.
fn notify_balance_changed<L: Ledger + ?Sized>(ledger: &mut L, balance: &AccountBalance, block: &BlockRef) {
    if let Err(e) = ledger.on_balance_changed(balance, block) {
        warn!(
            "Failed to snapshot balance of {} on {}: {}",
            balance.account, balance.token, e
        );
    }
}
