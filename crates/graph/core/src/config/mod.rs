//! Configuration of the indexing and serving components.

mod indexer;
pub use indexer::IndexerConfig;

mod caching;
pub use caching::{CachingConfig, MemoryCacheConfig, RedisCacheConfig};
