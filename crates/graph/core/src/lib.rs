//! Indexing and serving engine of chaingraph.
//!
//! The [`ChainIndexer`] turns blocks into an address graph stored in a
//! [`GraphDb`](chaingraph_storage::GraphDb). [`LocalFetcher`] serves that graph through the
//! [`GraphFetcher`](chaingraph_types::GraphFetcher) protocol, [`CachingFetcher`] puts a
//! [`Cache`] in front of any fetcher and [`GraphRpc`] exposes a fetcher to remote clients.
//! [`Scanner`]s replay stored tables for enrichment jobs such as the [`CodeIndexer`]
//! and the [`EnsIndexer`].

mod config;
pub use config::{CachingConfig, IndexerConfig, MemoryCacheConfig, RedisCacheConfig};

mod events;
pub use events::{AddressUpserted, ChainStateChanged, EventBus, RelationCreated};

mod metrics;

mod scanner;
pub use scanner::{ScanNotifier, Scanner, ScannerError};

mod chain;
pub use chain::{
    AlloyChainReader, BlockNode, BlockNodes, ChainBlock, ChainReader, ChainReaderError,
    ChainTransaction, RawBlock, RawTransaction,
};

mod indexer;
pub use indexer::{
    ChainIndexer, DerivedBatch, IndexerError, IndexerExit, MemoryProbe, ProcMemoryProbe,
    derive_batch,
};

mod cache;
pub use cache::{Cache, CacheError, CacheLookup, DiskCache, Existence, MemoryCache, RedisCache};

mod fetcher;
pub use fetcher::{CachingFetcher, LocalFetcher};

mod enrich;
pub use enrich::{CodeIndexer, EnrichError, EnsIndexer};

mod rpc;
pub use rpc::GraphRpc;
