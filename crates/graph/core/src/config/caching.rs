use std::time::Duration;

/// Behavior of the [`CachingFetcher`](crate::CachingFetcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachingConfig {
    /// Age after which a cached address is refreshed from upstream.
    pub staleness: Duration,
    /// Set when cache operations are cheap. Writes are then awaited and the local page walk
    /// follows every cached page instead of only the first.
    pub cache_is_free: bool,
    /// Serve from the cache only, never calling upstream.
    pub cache_only: bool,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::from_secs(32 * 60 * 60),
            cache_is_free: false,
            cache_only: false,
        }
    }
}

/// Sizing of the [`MemoryCache`](crate::MemoryCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCacheConfig {
    /// Maximum cached entries.
    pub max_entries: usize,
    /// Maximum cached negatives.
    pub max_negatives: usize,
    /// Maximum cached timelines.
    pub max_timelines: usize,
    /// Lifetime of a cached timeline.
    pub timeline_ttl: Duration,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 20_000,
            max_negatives: 100,
            max_timelines: 1_000,
            timeline_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Connection and sizing of the [`RedisCache`](crate::RedisCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisCacheConfig {
    /// Redis connection url, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    /// Lifetime of mutable entries: addresses and relation pages.
    pub mutable_ttl: Duration,
    /// Lifetime of immutable entries: blocks and transactions.
    pub immutable_ttl: Duration,
    /// Lifetime of cached timelines.
    pub timeline_ttl: Duration,
    /// Capacity of the address negative filter.
    pub address_filter_capacity: u64,
    /// Capacity of the block and transaction negative filter.
    pub node_filter_capacity: u64,
    /// Bucket size of the address filter.
    pub address_bucket_size: u64,
    /// Bucket size of the block and transaction filter.
    pub node_bucket_size: u64,
}

impl RedisCacheConfig {
    /// Creates a configuration with default lifetimes and filter sizing for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mutable_ttl: Duration::from_secs(14 * 24 * 60 * 60),
            immutable_ttl: Duration::from_secs(365 * 24 * 60 * 60),
            timeline_ttl: Duration::from_secs(24 * 60 * 60),
            address_filter_capacity: 4_000_000,
            node_filter_capacity: 16_000_000,
            address_bucket_size: 4,
            node_bucket_size: 5,
        }
    }
}
