//! Chain reads resolved ahead of a batch.
//!
//! The accounting core is synchronous. The scanner fetches everything it may
//! ask for (metadata of unseen tokens, `totalSupply` at the blocks of mint and
//! burn events) and hands the core a [`PrefetchedChainReads`]. A read that
//! failed is simply absent and surfaces as "unavailable".

use crate::collaborators::{ChainSupplyOracle, TokenRegistry};
use crate::config::DEFAULT_DECIMALS;
use crate::events::IERC20;
use crate::repository::TokenMetadata;
use crate::rpc::RpcClient;
use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PrefetchedChainReads {
    default_decimals: u8,
    metadata: HashMap<Address, TokenMetadata>,
    supplies: HashMap<(Address, u64), U256>,
}

impl Default for PrefetchedChainReads {
    fn default() -> Self {
        Self::new(DEFAULT_DECIMALS)
    }
}

impl PrefetchedChainReads {
    pub fn new(default_decimals: u8) -> Self {
        Self {
            default_decimals,
            metadata: HashMap::new(),
            supplies: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, token: Address, metadata: TokenMetadata) -> Self {
        self.metadata.insert(token, metadata);
        self
    }

    pub fn with_supply(mut self, token: Address, block: u64, supply: U256) -> Self {
        self.supplies.insert((token, block), supply);
        self
    }

    pub fn insert_metadata(&mut self, token: Address, metadata: TokenMetadata) {
        self.metadata.insert(token, metadata);
    }

    pub fn insert_supply(&mut self, token: Address, block: u64, supply: U256) {
        self.supplies.insert((token, block), supply);
    }
}

impl TokenRegistry for PrefetchedChainReads {
    fn resolve_or_create(&self, token: Address) -> TokenMetadata {
        self.metadata
            .get(&token)
            .cloned()
            .unwrap_or_else(|| TokenMetadata {
                name: String::new(),
                symbol: String::new(),
                decimals: self.default_decimals,
            })
    }
}

impl ChainSupplyOracle for PrefetchedChainReads {
    fn current_total_supply(&self, token: Address, block: u64) -> Option<U256> {
        self.supplies.get(&(token, block)).copied()
    }
}

/// Read name, symbol and decimals. Each field falls back on its own:
/// `""` for strings, `default_decimals` for decimals.
pub async fn fetch_token_metadata(
    client: &RpcClient,
    address: Address,
    default_decimals: u8,
) -> TokenMetadata {
    info!("Fetching token metadata for {:?}", address);

    let name = match client.call_contract(address, IERC20::nameCall {}, None).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Failed to fetch token name: {}", e);
            String::new()
        }
    };

    let symbol = match client.call_contract(address, IERC20::symbolCall {}, None).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Failed to fetch token symbol: {}", e);
            String::new()
        }
    };

    let decimals = match client.call_contract(address, IERC20::decimalsCall {}, None).await {
        Ok(result) => result,
        Err(e) => {
            warn!(
                "Failed to fetch token decimals: {}, using {}",
                e, default_decimals
            );
            default_decimals
        }
    };

    TokenMetadata {
        name,
        symbol,
        decimals,
    }
}

/// `totalSupply()` as of `block`, or `None` when the call fails.
pub async fn fetch_total_supply(client: &RpcClient, address: Address, block: u64) -> Option<U256> {
    match client
        .call_contract(address, IERC20::totalSupplyCall {}, Some(block))
        .await
    {
        Ok(supply) => Some(supply),
        Err(e) => {
            debug!(
                "totalSupply of {:?} at block {} unavailable: {}",
                address, block, e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const TOKEN: Address = address!("9e20461bc2c4c980f62f1b279d71734207a6a356");

    #[test]
    fn test_unknown_token_falls_back_to_defaults() {
        let reads = PrefetchedChainReads::new(6);
        let metadata = reads.resolve_or_create(TOKEN);
        assert_eq!(metadata.name, "");
        assert_eq!(metadata.symbol, "");
        assert_eq!(metadata.decimals, 6);
    }

    #[test]
    fn test_supply_is_keyed_by_block() {
        let reads = PrefetchedChainReads::default().with_supply(TOKEN, 10, U256::from(40u64));
        assert_eq!(reads.current_total_supply(TOKEN, 10), Some(U256::from(40u64)));
        assert_eq!(reads.current_total_supply(TOKEN, 11), None);
    }
}
