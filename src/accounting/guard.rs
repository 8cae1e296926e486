//! Dual-emission detection for mints and burns.
//!
//! Some tokens emit both a `Transfer` from/to a sentinel and a dedicated
//! `Mint`/`Burn` for the same action. Whichever arrives first is applied; when
//! the second arrives the tracked supply already equals the on-chain supply and
//! the event is absorbed.
//!
//! This is an approximation. Two independent actions that leave the on-chain
//! supply equal to the tracked one (or a supply read taken at the end of a
//! block holding several mints) are classified as already applied. An
//! unavailable supply read never blocks accounting.

use crate::collaborators::ChainSupplyOracle;
use crate::repository::Token;
use alloy_primitives::Address;
use tracing::debug;

/// True if the token's tracked supply already matches the chain, meaning the
/// mint/burn at hand was reflected by its twin event.
pub fn already_reflected(
    oracle: &dyn ChainSupplyOracle,
    token_address: Address,
    token: &Token,
    block: u64,
) -> bool {
    match oracle.current_total_supply(token_address, block) {
        Some(onchain) => onchain == token.total_supply,
        None => {
            debug!(
                "totalSupply unavailable for {} at block {}, applying event",
                token.id, block
            );
            false
        }
    }
}
