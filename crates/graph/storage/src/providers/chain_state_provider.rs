//! Provider for the indexer watermark.

use crate::{
    error::StorageError,
    models::ChainStates,
    tx::{DbRead, DbWrite},
};
use chaingraph_types::{CHAIN_STATE_KEY, ChainState};
use tracing::error;

/// Provides access to the persisted [`ChainState`].
#[derive(Debug)]
pub(crate) struct ChainStateProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> ChainStateProvider<'tx, TX> {
    /// Creates a new [`ChainStateProvider`] instance.
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

impl<TX> ChainStateProvider<'_, TX>
where
    TX: DbRead,
{
    pub(crate) fn chain_state(&self) -> Result<Option<ChainState>, StorageError> {
        self.tx.get::<ChainStates>(CHAIN_STATE_KEY).inspect_err(|err| {
            error!(target: "graph_storage", ?err, "Failed to read chain state");
        })
    }
}

impl<TX> ChainStateProvider<'_, TX>
where
    TX: DbWrite,
{
    pub(crate) fn save_chain_state(&self, state: &ChainState) -> Result<(), StorageError> {
        self.tx.put::<ChainStates>(CHAIN_STATE_KEY, state).inspect_err(|err| {
            error!(target: "graph_storage", ?state, ?err, "Failed to store chain state");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphDb;
    use alloy_primitives::U256;
    use tempfile::TempDir;

    #[test]
    fn test_chain_state_read_write() {
        let temp_dir = TempDir::new().expect("Could not create temp dir");
        let db = GraphDb::open(temp_dir.path()).expect("Failed to open database");

        assert_eq!(ChainStateProvider::new(&db).chain_state().unwrap(), None);

        let state = ChainState {
            latest_block_number: 103,
            latest_timestamp_ms: 1_030_000,
            latest_gas_price: U256::from(7),
        };
        db.transaction(|tx| ChainStateProvider::new(tx).save_chain_state(&state)).unwrap();
        assert_eq!(ChainStateProvider::new(&db).chain_state().unwrap(), Some(state));
    }
}
