use crate::{
    AddressUpserted, ChainStateChanged, EventBus, IndexerConfig, RelationCreated,
    chain::ChainReader,
    indexer::{IndexerError, MemoryProbe, ProcMemoryProbe, derive_batch},
    metrics::Metrics,
};
use alloy_primitives::U256;
use chaingraph_storage::{
    ChainStateStorage, GraphDb, GraphStorageWriter, IndexedBatch, StoredBatch,
};
use chaingraph_types::ChainState;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why the [`ChainIndexer`] loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerExit {
    /// Cancellation was requested.
    Cancelled,
    /// The chain head did not move for the configured number of polls.
    Stalled {
        /// The next block the indexer would have fetched.
        block: u64,
    },
    /// Resident memory crossed the configured threshold.
    MemoryCeiling {
        /// Resident memory at the time of the check.
        resident_bytes: u64,
    },
}

type PendingWrite = JoinHandle<Result<Duration, IndexerError>>;

/// Fetch and write durations accumulated between two progress reports.
#[derive(Debug, Default)]
struct Timings {
    batches: u32,
    fetch: Duration,
    write: Duration,
}

impl Timings {
    fn average_ms(total: Duration, batches: u32) -> u128 {
        total.as_millis() / u128::from(batches.max(1))
    }
}

/// Builds the graph from the chain, batch by batch, and persists it with the chain state.
///
/// The write of a batch overlaps with the fetch of the next one. At most one write is in
/// flight, and it is always awaited before the loop returns.
#[derive(Debug)]
pub struct ChainIndexer<R, M = ProcMemoryProbe> {
    reader: Arc<R>,
    db: Arc<GraphDb>,
    events: EventBus,
    probe: M,
    config: IndexerConfig,
    cancel: CancellationToken,
}

impl<R> ChainIndexer<R>
where
    R: ChainReader,
{
    /// Creates a new [`ChainIndexer`] probing the resident memory of the process.
    pub const fn new(
        reader: Arc<R>,
        db: Arc<GraphDb>,
        events: EventBus,
        config: IndexerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self { reader, db, events, probe: ProcMemoryProbe, config, cancel }
    }
}

impl<R, M> ChainIndexer<R, M>
where
    R: ChainReader,
    M: MemoryProbe,
{
    /// Replaces the memory probe used by the health check.
    pub fn with_memory_probe<P: MemoryProbe>(self, probe: P) -> ChainIndexer<R, P> {
        ChainIndexer {
            reader: self.reader,
            db: self.db,
            events: self.events,
            probe,
            config: self.config,
            cancel: self.cancel,
        }
    }

    /// Runs the indexing loop until it is cancelled, stalls, hits the memory ceiling or fails.
    pub async fn run(self) -> Result<IndexerExit, IndexerError> {
        Metrics::init();
        let mut pending = None;
        let exit = self.index(&mut pending).await;
        let flushed = match pending {
            Some(write) => write.await.map_err(IndexerError::from).and_then(|result| result),
            None => Ok(Duration::ZERO),
        };
        let exit = exit?;
        flushed.inspect_err(|err| {
            error!(target: "indexer", ?err, "Failed to flush the last batch");
        })?;
        info!(target: "indexer", ?exit, "Indexer stopped");
        Ok(exit)
    }

    /// Returns the first block of the batch to resume from: after the persisted chain state, or
    /// at the configured start block if that is further ahead.
    fn resume_block(&self) -> Result<u64, IndexerError> {
        let persisted = self
            .db
            .chain_state()?
            .map_or(0, |state| state.latest_block_number.saturating_add(1));
        let next = self.config.start_block.map_or(persisted, |start| start.max(persisted));
        Ok(self.config.align(next))
    }

    async fn gas_price(&self) -> Option<u128> {
        self.reader
            .gas_price()
            .await
            .inspect_err(|err| warn!(target: "indexer", %err, "Failed to fetch gas price"))
            .ok()
    }

    /// Sleeps for the poll interval. Returns false if cancellation was requested meanwhile.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.poll_interval) => true,
        }
    }

    async fn index(&self, pending: &mut Option<PendingWrite>) -> Result<IndexerExit, IndexerError> {
        let batch_size = self.config.batch_size.max(1);
        let mut block = self.resume_block()?;
        let mut gas_price = self.gas_price().await.unwrap_or_default();
        let mut latest = self.reader.block_number().await?;
        let mut misses = 0u32;
        let mut timings = Timings::default();
        info!(target: "indexer", block, latest, "Starting indexer");

        loop {
            if self.cancel.is_cancelled() {
                info!(target: "indexer", "Indexer cancellation requested, stopping...");
                return Ok(IndexerExit::Cancelled);
            }

            while block + batch_size >= latest && misses < self.config.max_poll_retries {
                if !self.pause().await {
                    info!(target: "indexer", "Indexer cancellation requested, stopping...");
                    return Ok(IndexerExit::Cancelled);
                }
                latest = self.reader.block_number().await?;
                misses += 1;
                Metrics::record_head_poll();
                debug!(target: "indexer", block, latest, misses, "Polled chain head");
            }
            if misses >= self.config.max_poll_retries {
                warn!(target: "indexer", block, latest, misses, "Chain head is not advancing");
                return Ok(IndexerExit::Stalled { block });
            }

            let max = latest.min(block + batch_size - 1);
            let fetch_started = Instant::now();
            let nodes = self.reader.block_nodes(block, max).await.inspect_err(|err| {
                error!(target: "indexer", block, max, %err, "Failed to fetch blocks");
            })?;
            let Some(derived) = derive_batch(&nodes) else {
                misses += 1;
                Metrics::record_transient_miss();
                debug!(target: "indexer", block, max, misses, "Range not processed yet");
                if !self.pause().await {
                    return Ok(IndexerExit::Cancelled);
                }
                continue;
            };
            misses = 0;
            timings.batches += 1;
            timings.fetch += fetch_started.elapsed();

            let batch = IndexedBatch {
                addresses: derived.addresses,
                relations: derived.relations,
                chain_state: ChainState {
                    latest_block_number: max,
                    latest_timestamp_ms: derived.last_timestamp.saturating_mul(1000),
                    latest_gas_price: U256::from(gas_price),
                },
            };
            if let Some(previous) = pending.take() {
                timings.write += previous.await??;
            }
            *pending = Some(self.spawn_write(batch, max + 1 - block, fetch_started.elapsed()));
            block = max + 1;

            if is_multiple(block, self.config.health_check_interval) {
                if let Some(exit) = self.check_memory(block) {
                    return Ok(exit);
                }
            }
            if is_multiple(block, self.config.report_interval) {
                info!(
                    target: "indexer",
                    block,
                    latest,
                    progress_pct = block * 100 / latest.max(1),
                    fetch_ms = Timings::average_ms(timings.fetch, timings.batches),
                    write_ms = Timings::average_ms(timings.write, timings.batches),
                    "Indexing progress"
                );
                timings = Timings::default();
                if let Some(price) = self.gas_price().await {
                    gas_price = price;
                }
            }
        }
    }

    fn check_memory(&self, block: u64) -> Option<IndexerExit> {
        let resident_bytes = self.probe.resident_bytes()?;
        let limit = self.config.memory_ceiling_bytes / 100 * self.config.memory_threshold_percent;
        debug!(target: "indexer", block, resident_bytes, limit, "Memory health check");
        if resident_bytes > limit {
            warn!(target: "indexer", block, resident_bytes, limit, "Memory threshold exceeded");
            return Some(IndexerExit::MemoryCeiling { resident_bytes });
        }
        None
    }

    /// Persists `batch` in the background and publishes what it changed.
    fn spawn_write(&self, batch: IndexedBatch, blocks: u64, fetch: Duration) -> PendingWrite {
        let db = Arc::clone(&self.db);
        let events = self.events.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let stored =
                tokio::task::spawn_blocking(move || db.store_graph_batch(batch)).await?.inspect_err(
                    |err| error!(target: "indexer", ?err, "Failed to store batch"),
                )?;
            let write = started.elapsed();
            Metrics::record_batch(blocks, stored.relations.len(), fetch, write);
            Metrics::record_latest_block(stored.chain_state.latest_block_number);
            publish(&events, stored);
            Ok(write)
        })
    }
}

fn is_multiple(block: u64, interval: u64) -> bool {
    block.checked_rem(interval) == Some(0)
}

fn publish(events: &EventBus, stored: StoredBatch) {
    let addresses: HashMap<_, _> =
        stored.addresses.iter().map(|address| (address.id.clone(), address)).collect();
    for (cursor, relation) in stored.relations {
        let address = addresses.get(cursor.entity_id()).map(|address| (*address).clone());
        events.publish_relation(RelationCreated { cursor, relation, address });
    }
    for address in stored.addresses {
        events.publish_address(AddressUpserted { address });
    }
    events.publish_chain_state(ChainStateChanged { state: stored.chain_state });
}
