use crate::{
    StorageError,
    types::{IndexedBatch, StoredBatch},
};
use alloy_primitives::B256;
use chaingraph_types::{AddressRecord, ChainState, GraphCursor, NodeId, Relation, ScanState};

/// Provides access to stored address records.
pub trait AddressStorage {
    /// Gets the [`AddressRecord`] stored for `id`.
    ///
    /// # Returns
    /// * `Ok(None)` if the address was never indexed.
    /// * `Err(StorageError)` if there is an issue reading the record.
    fn get_address(&self, id: &NodeId) -> Result<Option<AddressRecord>, StorageError>;

    /// Merges `incoming` into the stored record for its id and persists the result.
    ///
    /// Creation time is the minimum of both, last-seen and balance come from `incoming`, a set
    /// name is kept and a contract never becomes a wallet again.
    fn upsert_address(&self, incoming: &AddressRecord) -> Result<AddressRecord, StorageError>;
}

/// Provides paginated access to the relations filed under an address.
pub trait RelationStorage {
    /// Returns up to `limit` relations that sort after `cursor`, never crossing into the
    /// keyspace of another entity.
    fn relations_after(
        &self,
        cursor: &GraphCursor,
        limit: usize,
    ) -> Result<Vec<Relation>, StorageError>;

    /// Returns the page boundary cursors of `id`: the key of every
    /// [`PAGE_SIZE`](chaingraph_types::PAGE_SIZE)-th relation, at most `max_cursors` of them.
    fn relation_timeline(
        &self,
        id: &NodeId,
        max_cursors: usize,
    ) -> Result<Vec<GraphCursor>, StorageError>;
}

/// Provides access to the indexer watermark.
pub trait ChainStateStorage {
    /// Gets the persisted [`ChainState`], if the indexer ever committed a batch.
    fn chain_state(&self) -> Result<Option<ChainState>, StorageError>;
}

/// Provides access to the progress of named scanners.
pub trait ScanStateStorage {
    /// Gets the progress of scanner `name`, or the initial state if none was saved.
    fn scan_state(&self, name: &str) -> Result<ScanState, StorageError>;

    /// Persists the progress of scanner `name`.
    fn save_scan_state(&self, name: &str, state: &ScanState) -> Result<(), StorageError>;

    /// Forgets the progress of scanner `name` so the next scan starts from the beginning.
    fn clear_scan_state(&self, name: &str) -> Result<(), StorageError>;
}

/// Provides access to contract code fingerprints.
pub trait CodeStorage {
    /// Gets the code hash recorded for the contract `id`.
    fn code_hash(&self, id: &NodeId) -> Result<Option<B256>, StorageError>;

    /// Records the code hash of contract `id` and adds it to the clones of that hash.
    fn save_code_hash(&self, id: &NodeId, hash: B256) -> Result<(), StorageError>;

    /// Returns the other contracts deployed with the same code as `id`.
    fn contract_clones(&self, id: &NodeId) -> Result<Vec<NodeId>, StorageError>;
}

/// Provides access to the ENS names attached to addresses.
pub trait NameStorage {
    /// Gets the address that `name` was resolved for.
    fn name_owner(&self, name: &str) -> Result<Option<NodeId>, StorageError>;

    /// Records `name` as resolved for `id` and sets it on the stored address unless the address
    /// already has a name.
    ///
    /// # Returns
    /// * `Ok(Some(record))` with the address as stored after the write.
    /// * `Ok(None)` if `id` was never indexed. The name owner is recorded anyway.
    fn save_name(&self, id: &NodeId, name: &str) -> Result<Option<AddressRecord>, StorageError>;
}

/// Persists the output of one indexer batch.
pub trait GraphStorageWriter {
    /// Merge-upserts the addresses, inserts relations that are not stored yet and advances the
    /// chain state, all in one atomic write.
    fn store_graph_batch(&self, batch: IndexedBatch) -> Result<StoredBatch, StorageError>;
}
