//! Inputs and outputs of batched graph writes.

use chaingraph_types::{AddressRecord, ChainState, GraphCursor, Relation};

/// Everything the indexer derived from one batch of blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedBatch {
    /// Incoming address snapshots, at most one per address.
    pub addresses: Vec<AddressRecord>,
    /// Derived relations. Each must have an address anchor.
    pub relations: Vec<Relation>,
    /// The watermark to persist with the batch.
    pub chain_state: ChainState,
}

/// What a batch write actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredBatch {
    /// Address records after merging with stored state.
    pub addresses: Vec<AddressRecord>,
    /// Relations that were not stored before, with their storage keys.
    pub relations: Vec<(GraphCursor, Relation)>,
    /// The persisted watermark.
    pub chain_state: ChainState,
}
