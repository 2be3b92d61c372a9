//! Persistent ordered storage for the chaingraph indexer.
//!
//! [`GraphDb`] wraps one RocksDB instance with a column family per [`Table`]. Access goes through
//! crate private providers that operate on either the database itself or a pending
//! [`GraphBatch`], and is exposed through one storage trait per concern.

mod error;
pub use error::StorageError;

mod graphdb;
pub use graphdb::{GraphBatch, GraphDb};

pub mod models;
pub use models::Table;

mod providers;

mod traits;
pub use traits::{
    AddressStorage, ChainStateStorage, CodeStorage, GraphStorageWriter, NameStorage,
    RelationStorage, ScanStateStorage,
};

mod tx;
pub use tx::{DbRead, DbWrite};

mod types;
pub use types::{IndexedBatch, StoredBatch};
