use crate::metrics::Metrics;
use chaingraph_storage::{ChainStateStorage, GraphDb, ScanStateStorage};
use std::{
    fmt::Debug,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::warn;

/// Publishes a snapshot of some state as metrics.
#[cfg_attr(test, mockall::automock)]
pub trait MetricsReporter: Debug + Send + Sync {
    /// Records the current values.
    fn report_metrics(&self);
}

/// Reports the persisted watermarks of a [`GraphDb`]: the chain state and the progress of the
/// named scanners.
#[derive(Debug)]
pub struct GraphStatsReporter {
    db: Arc<GraphDb>,
    scanners: Vec<&'static str>,
}

impl GraphStatsReporter {
    /// Creates a reporter over `db` covering the given scanners.
    pub fn new(db: Arc<GraphDb>, scanners: Vec<&'static str>) -> Self {
        Metrics::init();
        Self { db, scanners }
    }
}

impl MetricsReporter for GraphStatsReporter {
    fn report_metrics(&self) {
        match self.db.chain_state() {
            Ok(Some(state)) => {
                let now_ms = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |elapsed| elapsed.as_millis() as u64);
                let age_ms = now_ms.saturating_sub(state.latest_timestamp_ms);
                Metrics::record_chain_state(state.latest_block_number, age_ms as f64 / 1000.0);
            }
            Ok(None) => {}
            Err(err) => warn!(target: "metric_reporter", %err, "Failed to read chain state"),
        }

        for &scanner in &self.scanners {
            match self.db.scan_state(scanner) {
                Ok(state) => {
                    Metrics::record_scanner(scanner, state.processed_count, state.is_synced);
                }
                Err(err) => {
                    warn!(target: "metric_reporter", %err, scanner, "Failed to read scan state");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaingraph_types::ScanState;
    use tempfile::TempDir;

    #[test]
    fn test_reports_empty_and_filled_db() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = Arc::new(GraphDb::open(&tmp_dir.path().join("graph")).expect("open db"));
        let reporter = GraphStatsReporter::new(Arc::clone(&db), vec!["code"]);
        reporter.report_metrics();

        let state = ScanState { processed_count: 3, is_synced: true, ..Default::default() };
        db.save_scan_state("code", &state).unwrap();
        reporter.report_metrics();
    }
}
