use crate::bucket::{Cadence, snapshot_id};
use crate::collaborators::KeyedStore;
use crate::error::AccountingError;
use crate::events::BlockRef;
use crate::repository::{Token, TokenSnapshot};
use alloy_primitives::U256;
use anyhow::Result;

/// Load the snapshot for the bucket holding `block`, or open a new one that
/// inherits the token's current cumulative state.
pub fn get_or_create_snapshot<S: KeyedStore + ?Sized>(
    store: &S,
    token: &Token,
    cadence: Cadence,
    block: &BlockRef,
) -> Result<TokenSnapshot> {
    let bucket = cadence.bucket(block.timestamp);
    let id = snapshot_id(&token.id, bucket);

    if let Some(snapshot) = store.load_snapshot(cadence, &id)? {
        return Ok(snapshot);
    }

    Ok(TokenSnapshot::open(
        token,
        cadence,
        bucket,
        block.number,
        block.timestamp,
    ))
}

impl TokenSnapshot {
    /// Copy cumulative state from the token and stamp the contributing block.
    pub fn mirror(&mut self, token: &Token, block: &BlockRef) {
        self.total_supply = token.total_supply;
        self.current_holder_count = token.current_holder_count;
        self.cumulative_holder_count = token.cumulative_holder_count;
        self.block_number = block.number;
        self.timestamp = block.timestamp;
    }

    pub fn record_mint(&mut self, amount: U256) -> Result<(), AccountingError> {
        self.mint_amount = self.add(self.mint_amount, amount, "snapshot_mint_amount")?;
        self.event_count += 1;
        self.mint_count += 1;
        Ok(())
    }

    pub fn record_burn(&mut self, amount: U256) -> Result<(), AccountingError> {
        self.burn_amount = self.add(self.burn_amount, amount, "snapshot_burn_amount")?;
        self.event_count += 1;
        self.burn_count += 1;
        Ok(())
    }

    pub fn record_transfer(&mut self, amount: U256) -> Result<(), AccountingError> {
        self.transfer_amount = self.add(self.transfer_amount, amount, "snapshot_transfer_amount")?;
        self.event_count += 1;
        self.transfer_count += 1;
        Ok(())
    }

    pub fn record_bridge_in(&mut self, amount: U256) -> Result<(), AccountingError> {
        self.lz_bridged_in = self.add(self.lz_bridged_in, amount, "snapshot_lz_bridged_in")?;
        self.lz_bridged_in_count += 1;
        Ok(())
    }

    pub fn record_bridge_out(&mut self, amount: U256) -> Result<(), AccountingError> {
        self.lz_bridged_out = self.add(self.lz_bridged_out, amount, "snapshot_lz_bridged_out")?;
        self.lz_bridged_out_count += 1;
        Ok(())
    }

    fn add(&self, lhs: U256, rhs: U256, field: &'static str) -> Result<U256, AccountingError> {
        lhs.checked_add(rhs).ok_or_else(|| AccountingError::AmountOverflow {
            token: self.token.clone(),
            field,
        })
    }
}

/// The daily and hourly snapshot an event falls into.
#[derive(Debug, Clone)]
pub struct Windows {
    pub daily: TokenSnapshot,
    pub hourly: TokenSnapshot,
}

impl Windows {
    /// Must be called after the token has been mutated for the event.
    pub fn open<S: KeyedStore + ?Sized>(store: &S, token: &Token, block: &BlockRef) -> Result<Self> {
        Ok(Self {
            daily: get_or_create_snapshot(store, token, Cadence::Daily, block)?,
            hourly: get_or_create_snapshot(store, token, Cadence::Hourly, block)?,
        })
    }

    pub fn update(
        &mut self,
        token: &Token,
        block: &BlockRef,
        record: impl Fn(&mut TokenSnapshot) -> Result<(), AccountingError>,
    ) -> Result<()> {
        for snapshot in [&mut self.daily, &mut self.hourly] {
            snapshot.mirror(token, block);
            record(snapshot)?;
        }
        Ok(())
    }

    pub fn save<S: KeyedStore + ?Sized>(&self, store: &mut S) -> Result<()> {
        store.save_snapshot(&self.daily)?;
        store.save_snapshot(&self.hourly)?;
        Ok(())
    }
}
