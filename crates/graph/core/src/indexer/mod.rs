//! The chain indexer.

mod derive;
pub use derive::{DerivedBatch, derive_batch};

mod error;
pub use error::IndexerError;

mod memory;
#[cfg(test)]
pub(crate) use memory::MockMemoryProbe;
pub use memory::{MemoryProbe, ProcMemoryProbe};

mod task;
pub use task::{ChainIndexer, IndexerExit};
