//! Provider for scanner progress.

use crate::{
    error::StorageError,
    models::ScanStates,
    tx::{DbRead, DbWrite},
};
use chaingraph_types::{ScanState, scan_state_key};
use tracing::error;

/// Provides access to [`ScanState`] records keyed by scanner name.
#[derive(Debug)]
pub(crate) struct ScanStateProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> ScanStateProvider<'tx, TX> {
    /// Creates a new [`ScanStateProvider`] instance.
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

impl<TX> ScanStateProvider<'_, TX>
where
    TX: DbRead,
{
    pub(crate) fn scan_state(&self, name: &str) -> Result<ScanState, StorageError> {
        let state = self.tx.get::<ScanStates>(&scan_state_key(name)).inspect_err(|err| {
            error!(target: "graph_storage", name, ?err, "Failed to read scan state");
        })?;
        Ok(state.unwrap_or_default())
    }
}

impl<TX> ScanStateProvider<'_, TX>
where
    TX: DbWrite,
{
    pub(crate) fn save_scan_state(
        &self,
        name: &str,
        state: &ScanState,
    ) -> Result<(), StorageError> {
        self.tx.put::<ScanStates>(&scan_state_key(name), state).inspect_err(|err| {
            error!(target: "graph_storage", name, ?err, "Failed to store scan state");
        })
    }

    pub(crate) fn clear_scan_state(&self, name: &str) -> Result<(), StorageError> {
        self.tx.delete::<ScanStates>(&scan_state_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphDb;
    use tempfile::TempDir;

    #[test]
    fn test_scan_state_per_name() {
        let temp_dir = TempDir::new().expect("Could not create temp dir");
        let db = GraphDb::open(temp_dir.path()).expect("Failed to open database");
        let provider = ScanStateProvider::new(&db);

        assert_eq!(provider.scan_state("code").unwrap(), ScanState::default());

        let state = ScanState {
            last_processed_key: Some("a,x".to_string()),
            is_synced: true,
            processed_count: 4,
        };
        provider.save_scan_state("code", &state).unwrap();
        assert_eq!(provider.scan_state("code").unwrap(), state);
        assert_eq!(provider.scan_state("other").unwrap(), ScanState::default());

        provider.clear_scan_state("code").unwrap();
        assert_eq!(provider.scan_state("code").unwrap(), ScanState::default());
    }
}
