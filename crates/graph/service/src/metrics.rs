//! Gauges published by the [`GraphStatsReporter`](crate::GraphStatsReporter).

/// Container for the metric names and recording helpers of the service.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    pub(crate) const CHAIN_STATE_BLOCK: &'static str = "chaingraph_chain_state_block";
    pub(crate) const CHAIN_STATE_AGE_SECONDS: &'static str = "chaingraph_chain_state_age_seconds";
    pub(crate) const SCANNER_PROCESSED: &'static str = "chaingraph_scanner_processed";
    pub(crate) const SCANNER_SYNCED: &'static str = "chaingraph_scanner_synced";

    pub(crate) fn init() {
        metrics::describe_gauge!(
            Self::CHAIN_STATE_BLOCK,
            metrics::Unit::Count,
            "Last block persisted in the chain state",
        );
        metrics::describe_gauge!(
            Self::CHAIN_STATE_AGE_SECONDS,
            metrics::Unit::Seconds,
            "Age of the last indexed block",
        );
        metrics::describe_gauge!(
            Self::SCANNER_PROCESSED,
            metrics::Unit::Count,
            "Live updates processed by a scanner",
        );
        metrics::describe_gauge!(
            Self::SCANNER_SYNCED,
            "Whether a scanner has caught up with history",
        );
    }

    pub(crate) fn record_chain_state(block: u64, age_secs: f64) {
        metrics::gauge!(Self::CHAIN_STATE_BLOCK).set(block as f64);
        metrics::gauge!(Self::CHAIN_STATE_AGE_SECONDS).set(age_secs);
    }

    pub(crate) fn record_scanner(scanner: &'static str, processed: u64, synced: bool) {
        metrics::gauge!(Self::SCANNER_PROCESSED, "scanner" => scanner).set(processed as f64);
        let synced = if synced { 1.0 } else { 0.0 };
        metrics::gauge!(Self::SCANNER_SYNCED, "scanner" => scanner).set(synced);
    }
}
