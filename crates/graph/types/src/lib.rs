//! Core types shared across chaingraph components.
//!
//! This crate defines the graph data model (entities, relations and their ids), the radix-252
//! and cursor codecs used for storage keys and pagination tokens, the persisted watermarks, and
//! the [`GraphFetcher`] pull protocol implemented by every read path.

pub mod radix;

mod id;
pub use id::{IdError, NodeId, NodeKind, RelationId, RelationKind};

mod entity;
pub use entity::{
    AddressKind, AddressRecord, BlockRecord, GraphObject, Relation, TransactionRecord,
};

mod cursor;
pub use cursor::{
    CursorError, GraphCursor, HASH_WIDTH, PAGE_SIZE, ParsedCursor, TS_WIDTH, is_valid_cursor,
    relation_hash,
};

mod state;
pub use state::{CHAIN_STATE_KEY, ChainState, SCAN_STATE_PREFIX, ScanState, scan_state_key};

mod error;
pub use error::{NodeError, NodeErrorKind};

mod fetch;
pub use fetch::{FetchStep, FetchStream, GraphFetcher};

mod cache;
pub use cache::CacheValue;
