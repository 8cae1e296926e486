use crate::accounting::{Accountant, Outcome};
use crate::chain_reads::{PrefetchedChainReads, fetch_token_metadata, fetch_total_supply};
use crate::classifier::{EventKind, classify};
use crate::collaborators::Atomic;
use crate::config::Config;
use crate::deployment::resolve_start_block;
use crate::events::{
    BlockRef, LogRef, TokenEvent, TokenEventKind, decode_event_kind, log_position, tracked_topics,
};
use crate::keys::token_id;
use crate::repository::{Database, ProgressRepository, TokenRepository};
use crate::rpc::RpcClient;
use alloy::rpc::types::Log;
use alloy_primitives::{Address, B256};
use anyhow::Result;
use futures::{StreamExt, TryStreamExt, stream};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const RATE_LIMIT_DELAY_MS: u64 = 200;
const FETCH_CONCURRENCY: usize = 8;

/// A decoded log still missing its block timestamp and transaction nonce.
struct PendingEvent {
    token: Address,
    tx_hash: B256,
    log_index: u64,
    block_number: u64,
    block_timestamp: Option<u64>,
    kind: TokenEventKind,
}

pub struct Scanner {
    client: RpcClient,
    db: Database,
    accountant: Accountant,
    addresses: Vec<Address>,
    topics: Vec<B256>,
    start_block: Option<u64>,
    default_decimals: u8,
    batch_size: u64,
    poll_interval: Duration,
}

impl Scanner {
    pub fn new(client: RpcClient, db: Database, config: &Config) -> Self {
        Scanner {
            client,
            db,
            accountant: Accountant::new(config.bridge_token_aliases.clone()),
            addresses: config.watched_addresses(),
            topics: tracked_topics(),
            start_block: config.start_block,
            default_decimals: config.default_decimals,
            batch_size: config.batch_size,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    /// Override the start block of contracts with no progress yet.
    pub fn with_start_block(mut self, block: Option<u64>) -> Self {
        if block.is_some() {
            self.start_block = block;
        }
        self
    }

    /// Scan forever, or until the chain head when `once` is set.
    pub async fn run(&mut self, once: bool) -> Result<()> {
        self.ensure_progress().await?;

        loop {
            let loop_start = Instant::now();

            let cursors = self.next_blocks()?;
            let applied = self.applied_logs()?;
            let Some(from) = cursors.values().copied().min() else {
                anyhow::bail!("No contracts to scan");
            };
            let latest_block = self.client.get_latest_block().await?;

            if from > latest_block {
                if once {
                    info!("Caught up to latest block {}, stopping", latest_block);
                    return Ok(());
                }
                info!(
                    "Caught up to latest block {}. Entering polling mode...",
                    latest_block
                );
                sleep(self.poll_interval).await;
                continue;
            }

            let to_block = (from + self.batch_size - 1).min(latest_block);
            info!("Fetching logs for blocks {} to {}", from, to_block);

            let logs = self
                .client
                .get_logs(from, to_block, &self.addresses, &self.topics)
                .await?;
            info!("Received {} logs for blocks {} to {}", logs.len(), from, to_block);

            let pending = Self::decode_logs(logs, &cursors, &applied);
            if !pending.is_empty() {
                let events = self.enrich(pending).await?;
                let reads = self.prefetch(&events).await?;
                self.apply_all(&events, &reads);
            }

            let progress = ProgressRepository::new(&self.db.conn);
            for (address, next) in &cursors {
                if *next <= to_block {
                    progress.update_last_processed_block(address, to_block)?;
                }
            }
            info!("Updated last processed block to {}", to_block);

            let loop_duration = loop_start.elapsed();
            let target_duration = Duration::from_millis(RATE_LIMIT_DELAY_MS);
            if loop_duration < target_duration {
                sleep(target_duration - loop_duration).await;
            }
        }
    }

    async fn ensure_progress(&self) -> Result<()> {
        for address in &self.addresses {
            let progress = ProgressRepository::new(&self.db.conn);
            if let Some(block) = progress.get_start_block(address)? {
                info!("Using cached start block {} for {:?}", block, address);
                continue;
            }

            let start_block = resolve_start_block(&self.client, *address, self.start_block).await?;
            ProgressRepository::new(&self.db.conn).insert(address, start_block)?;
        }
        Ok(())
    }

    /// First unprocessed block of every watched contract.
    fn next_blocks(&self) -> Result<HashMap<Address, u64>> {
        let progress = ProgressRepository::new(&self.db.conn);
        let mut cursors = HashMap::new();
        for address in &self.addresses {
            let next = match progress.get_last_processed_block(address)? {
                Some(block) => block + 1,
                None => progress.get_start_block(address)?.unwrap_or_default(),
            };
            cursors.insert(*address, next);
        }
        Ok(cursors)
    }

    /// Last committed log position of every watched contract that has one.
    fn applied_logs(&self) -> Result<HashMap<Address, (u64, u64)>> {
        let progress = ProgressRepository::new(&self.db.conn);
        let mut applied = HashMap::new();
        for address in &self.addresses {
            if let Some(position) = progress.last_applied_log(address)? {
                applied.insert(*address, position);
            }
        }
        Ok(applied)
    }

    /// Decode tracked logs not yet covered by their contract's cursors, in
    /// (block, log index) order.
    fn decode_logs(
        logs: Vec<Log>,
        cursors: &HashMap<Address, u64>,
        applied: &HashMap<Address, (u64, u64)>,
    ) -> Vec<PendingEvent> {
        let mut pending = Vec::new();

        for log in logs {
            let token = log.address();
            let (tx_hash, log_index, block_number) = match log_position(&log) {
                Ok(position) => position,
                Err(e) => {
                    warn!("Skipping log of {:?}: {}", token, e);
                    continue;
                }
            };
            if !is_pending(
                (block_number, log_index),
                cursors.get(&token).copied(),
                applied.get(&token).copied(),
            ) {
                continue;
            }

            match decode_event_kind(&log) {
                Ok(Some(kind)) => pending.push(PendingEvent {
                    token,
                    tx_hash,
                    log_index,
                    block_number,
                    block_timestamp: log.block_timestamp,
                    kind,
                }),
                Ok(None) => {}
                Err(e) => warn!("Failed to decode log {:?}:{}: {}", tx_hash, log_index, e),
            }
        }

        pending.sort_by_key(|e| (e.block_number, e.log_index));
        pending
    }

    /// Attach block timestamps and transaction nonces, fetched concurrently.
    async fn enrich(&self, pending: Vec<PendingEvent>) -> Result<Vec<TokenEvent>> {
        let mut timestamps: HashMap<u64, u64> = pending
            .iter()
            .filter_map(|e| e.block_timestamp.map(|ts| (e.block_number, ts)))
            .collect();
        let missing_blocks: HashSet<u64> = pending
            .iter()
            .map(|e| e.block_number)
            .filter(|b| !timestamps.contains_key(b))
            .collect();
        let tx_hashes: HashSet<B256> = pending.iter().map(|e| e.tx_hash).collect();

        let fetched: Vec<(u64, u64)> = stream::iter(missing_blocks)
            .map(|block| async move {
                let timestamp = self.client.get_block_timestamp(block).await?;
                Ok::<_, anyhow::Error>((block, timestamp))
            })
            .buffer_unordered(FETCH_CONCURRENCY)
            .try_collect()
            .await?;
        timestamps.extend(fetched);

        let nonces: HashMap<B256, u64> = stream::iter(tx_hashes)
            .map(|hash| async move {
                let nonce = self.client.get_transaction_nonce(hash).await?;
                Ok::<_, anyhow::Error>((hash, nonce))
            })
            .buffer_unordered(FETCH_CONCURRENCY)
            .try_collect()
            .await?;

        debug!(
            "Fetched {} block timestamps and {} nonces",
            timestamps.len(),
            nonces.len()
        );

        pending
            .into_iter()
            .map(|e| {
                let timestamp = timestamps
                    .get(&e.block_number)
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("Missing timestamp for block {}", e.block_number))?;
                let nonce = nonces
                    .get(&e.tx_hash)
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("Missing nonce for transaction {:?}", e.tx_hash))?;
                Ok(TokenEvent {
                    log: LogRef {
                        token: e.token,
                        tx_hash: e.tx_hash,
                        log_index: e.log_index,
                        nonce,
                        block: BlockRef {
                            number: e.block_number,
                            timestamp,
                        },
                    },
                    kind: e.kind,
                })
            })
            .collect()
    }

    /// Metadata of tokens not resolved yet and supply at every mint/burn block.
    async fn prefetch(&self, events: &[TokenEvent]) -> Result<PrefetchedChainReads> {
        let mut reads = PrefetchedChainReads::new(self.default_decimals);
        let token_repo = TokenRepository::new(&self.db.conn);

        let mut unresolved = HashSet::new();
        let mut supply_reads = HashSet::new();
        for event in events {
            let address = self.accountant.accounted_token(event);
            if !unresolved.contains(&address) {
                let resolved = token_repo
                    .load(&token_id(&address))?
                    .is_some_and(|t| t.is_resolved());
                if !resolved {
                    unresolved.insert(address);
                }
            }

            let needs_supply = classify(&event.kind)
                .is_some_and(|c| matches!(c.kind(), EventKind::Mint | EventKind::Burn));
            if needs_supply {
                supply_reads.insert((address, event.log.block.number));
            }
        }

        for address in unresolved {
            let metadata = fetch_token_metadata(&self.client, address, self.default_decimals).await;
            reads.insert_metadata(address, metadata);
        }

        let supplies: Vec<_> = stream::iter(supply_reads)
            .map(|(address, block)| async move {
                (address, block, fetch_total_supply(&self.client, address, block).await)
            })
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect()
            .await;
        for (address, block, supply) in supplies {
            if let Some(supply) = supply {
                reads.insert_supply(address, block, supply);
            }
        }

        Ok(reads)
    }

    fn apply_all(&mut self, events: &[TokenEvent], reads: &PrefetchedChainReads) {
        let mut applied = 0usize;
        for event in events {
            match apply_once(&mut self.db, &self.accountant, reads, event) {
                Ok(Some(Outcome::Applied(_))) => applied += 1,
                Ok(None) => debug!(
                    "Event {:?}:{} already committed, skipping",
                    event.log.tx_hash, event.log.log_index
                ),
                Ok(Some(outcome)) => debug!(
                    "Event {:?}:{} not applied: {:?}",
                    event.log.tx_hash, event.log.log_index, outcome
                ),
                Err(e) => error!(
                    "Failed to apply event {:?}:{} of {:?}: {:#}",
                    event.log.tx_hash, event.log.log_index, event.log.token, e
                ),
            }
        }
        info!("Applied {}/{} events", applied, events.len());
    }
}

/// Apply one event and move its contract's log cursor in the same
/// transaction. `None` when the cursor already covers the log.
pub fn apply_once(
    db: &mut Database,
    accountant: &Accountant,
    reads: &PrefetchedChainReads,
    event: &TokenEvent,
) -> Result<Option<Outcome>> {
    let contract = event.log.token;
    let position = (event.log.block.number, event.log.log_index);
    let applied = ProgressRepository::new(&db.conn).last_applied_log(&contract)?;
    if applied.is_some_and(|last| position <= last) {
        return Ok(None);
    }

    db.atomically(|db| {
        let outcome = accountant.process(db, reads, reads, event)?;
        ProgressRepository::new(&db.conn).mark_applied(&contract, position.0, position.1)?;
        Ok(Some(outcome))
    })
}

/// A log still needs applying when it lies at or past its contract's next
/// block and after the last committed position.
fn is_pending(position: (u64, u64), next_block: Option<u64>, applied: Option<(u64, u64)>) -> bool {
    let Some(next_block) = next_block else {
        return false;
    };
    position.0 >= next_block && applied.is_none_or(|last| position > last)
}
