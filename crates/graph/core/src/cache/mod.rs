//! Cache backends of the [`CachingFetcher`](crate::CachingFetcher).

use async_trait::async_trait;
use chaingraph_types::{CacheValue, GraphCursor, NodeId};
use std::{
    fmt::Debug,
    time::{SystemTime, UNIX_EPOCH},
};

mod error;
pub use error::CacheError;

mod memory;
pub use memory::MemoryCache;

mod disk;
pub use disk::DiskCache;

mod remote;
pub use remote::RedisCache;

/// Wall clock time in milliseconds since the epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_millis() as u64)
}

/// Answer of [`Cache::exists`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    /// The key definitely does not exist upstream.
    No,
    /// A value is cached for the key.
    Yes,
    /// The cache cannot tell.
    Unknown,
}

/// Answer of [`Cache::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// The cached value.
    Hit(CacheValue),
    /// Nothing is cached for the key.
    Miss,
}

impl CacheLookup {
    /// Returns the cached value, if any.
    pub fn into_value(self) -> Option<CacheValue> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Miss => None,
        }
    }
}

/// Storage behind the [`CachingFetcher`](crate::CachingFetcher).
///
/// Keys are entity ids or cursors. Entries are snapshots: writing a key replaces its value.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cache: Debug + Send + Sync {
    /// Three-state existence check of `key`.
    async fn exists(&self, key: &str) -> Result<Existence, CacheError>;

    /// Records that `key` definitely does not exist.
    async fn set_not_exists(&self, key: &str) -> Result<(), CacheError>;

    /// Gets the value cached under `key`.
    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError>;

    /// Caches `value` under `key`, clearing any negative recorded for it.
    async fn set(&self, key: &str, value: CacheValue) -> Result<(), CacheError>;

    /// Gets the cached timeline of `id`.
    async fn get_timeline(&self, id: &NodeId) -> Result<Option<Vec<GraphCursor>>, CacheError>;

    /// Caches the complete timeline of `id`.
    async fn set_timeline(&self, id: &NodeId, timeline: Vec<GraphCursor>)
    -> Result<(), CacheError>;
}
