use crate::rpc::RpcClient;
use alloy_primitives::Address;
use anyhow::Result;
use std::future::Future;
use tracing::info;

/// Where scanning of `address` starts: the configured block if any, otherwise
/// the block the contract was deployed in.
pub async fn resolve_start_block(
    client: &RpcClient,
    address: Address,
    configured: Option<u64>,
) -> Result<u64> {
    if let Some(block) = configured {
        info!("Using configured start block {} for {:?}", block, address);
        return Ok(block);
    }
    let latest_block = client.get_latest_block().await?;
    find_deployment_block(client, address, latest_block).await
}

pub async fn find_deployment_block(
    client: &RpcClient,
    address: Address,
    latest_block: u64,
) -> Result<u64> {
    info!("Searching for deployment block of contract {:?}", address);

    let code = client.get_code_at_block(address, latest_block).await?;
    if code.is_empty() {
        anyhow::bail!("Address {:?} is not a deployed contract", address);
    }

    let block = first_block_where(0, latest_block, |block| async move {
        Ok(!client.get_code_at_block(address, block).await?.is_empty())
    })
    .await?;

    info!("Contract {:?} deployed at block {}", address, block);
    Ok(block)
}

/// Lowest block in `[low, high]` for which `probe` holds, assuming it holds
/// at `high` and, once true, stays true.
pub async fn first_block_where<F, Fut>(low: u64, high: u64, probe: F) -> Result<u64>
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut left = low;
    let mut right = high;

    while left < right {
        let mid = left + (right - left) / 2;
        if probe(mid).await? {
            right = mid;
        } else {
            left = mid + 1;
        }
    }

    Ok(left)
}
