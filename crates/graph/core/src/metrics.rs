//! Metrics recorded by the core components.

use std::time::Duration;

/// Container for the metric names and recording helpers of the core components.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    pub(crate) const INDEXER_BLOCKS_INDEXED_TOTAL: &'static str =
        "chaingraph_indexer_blocks_indexed_total";
    pub(crate) const INDEXER_RELATIONS_CREATED_TOTAL: &'static str =
        "chaingraph_indexer_relations_created_total";
    pub(crate) const INDEXER_TRANSIENT_MISSES_TOTAL: &'static str =
        "chaingraph_indexer_transient_misses_total";
    pub(crate) const INDEXER_HEAD_POLLS_TOTAL: &'static str =
        "chaingraph_indexer_head_polls_total";
    pub(crate) const INDEXER_FETCH_DURATION_SECONDS: &'static str =
        "chaingraph_indexer_fetch_duration_seconds";
    pub(crate) const INDEXER_WRITE_DURATION_SECONDS: &'static str =
        "chaingraph_indexer_write_duration_seconds";
    pub(crate) const INDEXER_LATEST_BLOCK: &'static str = "chaingraph_indexer_latest_block";

    pub(crate) const SCANNER_RECORDS_TOTAL: &'static str = "chaingraph_scanner_records_total";

    pub(crate) const CACHE_LOOKUPS_TOTAL: &'static str = "chaingraph_cache_lookups_total";

    pub(crate) const RPC_SUBSCRIPTIONS_TOTAL: &'static str = "chaingraph_rpc_subscriptions_total";

    /// Describes and zeroes every metric.
    pub(crate) fn init() {
        Self::describe();
        Self::zero();
    }

    fn describe() {
        metrics::describe_counter!(
            Self::INDEXER_BLOCKS_INDEXED_TOTAL,
            metrics::Unit::Count,
            "Total number of blocks indexed",
        );
        metrics::describe_counter!(
            Self::INDEXER_RELATIONS_CREATED_TOTAL,
            metrics::Unit::Count,
            "Total number of relations inserted by the indexer",
        );
        metrics::describe_counter!(
            Self::INDEXER_TRANSIENT_MISSES_TOTAL,
            metrics::Unit::Count,
            "Total number of block batches returned before the node was ready",
        );
        metrics::describe_counter!(
            Self::INDEXER_HEAD_POLLS_TOTAL,
            metrics::Unit::Count,
            "Total number of chain head polls while waiting for new blocks",
        );
        metrics::describe_histogram!(
            Self::INDEXER_FETCH_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Latency of fetching one block batch",
        );
        metrics::describe_histogram!(
            Self::INDEXER_WRITE_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Latency of writing one block batch",
        );
        metrics::describe_gauge!(
            Self::INDEXER_LATEST_BLOCK,
            metrics::Unit::Count,
            "Last block committed by the indexer",
        );
        metrics::describe_counter!(
            Self::SCANNER_RECORDS_TOTAL,
            metrics::Unit::Count,
            "Total number of records delivered by scanners",
        );
        metrics::describe_counter!(
            Self::CACHE_LOOKUPS_TOTAL,
            metrics::Unit::Count,
            "Total number of cache lookups by entity class and outcome",
        );
        metrics::describe_counter!(
            Self::RPC_SUBSCRIPTIONS_TOTAL,
            metrics::Unit::Count,
            "Total number of fetch subscriptions served",
        );
    }

    fn zero() {
        metrics::counter!(Self::INDEXER_BLOCKS_INDEXED_TOTAL).increment(0);
        metrics::counter!(Self::INDEXER_RELATIONS_CREATED_TOTAL).increment(0);
        metrics::counter!(Self::INDEXER_TRANSIENT_MISSES_TOTAL).increment(0);
        metrics::counter!(Self::INDEXER_HEAD_POLLS_TOTAL).increment(0);
    }

    pub(crate) fn record_batch(blocks: u64, relations: usize, fetch: Duration, write: Duration) {
        metrics::counter!(Self::INDEXER_BLOCKS_INDEXED_TOTAL).increment(blocks);
        metrics::counter!(Self::INDEXER_RELATIONS_CREATED_TOTAL).increment(relations as u64);
        metrics::histogram!(Self::INDEXER_FETCH_DURATION_SECONDS).record(fetch.as_secs_f64());
        metrics::histogram!(Self::INDEXER_WRITE_DURATION_SECONDS).record(write.as_secs_f64());
    }

    pub(crate) fn record_latest_block(block: u64) {
        metrics::gauge!(Self::INDEXER_LATEST_BLOCK).set(block as f64);
    }

    pub(crate) fn record_transient_miss() {
        metrics::counter!(Self::INDEXER_TRANSIENT_MISSES_TOTAL).increment(1);
    }

    pub(crate) fn record_head_poll() {
        metrics::counter!(Self::INDEXER_HEAD_POLLS_TOTAL).increment(1);
    }

    pub(crate) fn record_scanned(scanner: &str, live: bool) {
        metrics::counter!(
            Self::SCANNER_RECORDS_TOTAL,
            "scanner" => scanner.to_string(),
            "mode" => if live { "live" } else { "history" },
        )
        .increment(1);
    }

    pub(crate) fn record_cache_lookup(class: &'static str, hit: bool) {
        metrics::counter!(
            Self::CACHE_LOOKUPS_TOTAL,
            "class" => class,
            "outcome" => if hit { "hit" } else { "miss" },
        )
        .increment(1);
    }

    pub(crate) fn record_subscription(method: &'static str) {
        metrics::counter!(Self::RPC_SUBSCRIPTIONS_TOTAL, "method" => method).increment(1);
    }
}
