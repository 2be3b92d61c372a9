//! [`GraphFetcher`](chaingraph_types::GraphFetcher) implementations.

mod local;
pub use local::LocalFetcher;

mod caching;
pub use caching::CachingFetcher;
