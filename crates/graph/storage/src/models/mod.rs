//! Table schemas of the graph database.
//!
//! Each table maps to one RocksDB column family. Keys are UTF-8 strings so the byte-wise key
//! order of RocksDB equals the string order of entity ids and cursors. Values are stored as
//! JSON.

use alloy_primitives::B256;
use chaingraph_types::{
    AddressRecord, CacheValue, ChainState, GraphCursor, NodeId, Relation, ScanState,
};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

/// A typed column family.
pub trait Table: Debug + Send + Sync + 'static {
    /// Column family name.
    const NAME: &'static str;

    /// Stored value type.
    type Value: Serialize + DeserializeOwned + Debug + Send + Sync;
}

/// Declares marker types implementing [`Table`] and the list of all table names.
///
/// # Example
/// ```ignore
/// tables! {
///     /// Address records keyed by address id.
///     Addresses => "addresses": AddressRecord,
/// }
/// ```
macro_rules! tables {
    ($($(#[$meta:meta])* $table:ident => $name:literal: $value:ty),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $table;

            impl Table for $table {
                const NAME: &'static str = $name;
                type Value = $value;
            }
        )+

        /// Names of every table, used to open the column families.
        pub const TABLES: &[&str] = &[$($name),+];
    };
}

tables! {
    /// Address records keyed by address id.
    Addresses => "addresses": AddressRecord,
    /// Relations keyed by their cursor inside the anchor address's keyspace.
    AddressRels => "address_rels": Relation,
    /// The indexer watermark, under a single reserved key.
    ChainStates => "chain_state": ChainState,
    /// Scanner progress keyed by `__scan-<name>`.
    ScanStates => "scan_state": ScanState,
    /// Code hash of indexed contracts keyed by address id.
    ContractCodes => "contract_codes": B256,
    /// Contracts sharing a code hash, keyed by the hex hash.
    CodeClones => "code_clones": Vec<NodeId>,
    /// Owner of every reverse resolved ENS name, keyed by the name.
    EnsNames => "ens_names": NodeId,
    /// Disk cache entries keyed by entity id or cursor.
    CacheEntries => "cache_entries": CacheValue,
    /// Disk cache timelines keyed by entity id.
    CacheTimelines => "cache_timelines": Vec<GraphCursor>,
    /// Disk cache negatives keyed by entity id, valued by the insertion time in milliseconds.
    CacheNegatives => "cache_negatives": u64,
}
