use crate::{
    MemoryCacheConfig,
    cache::{Cache, CacheError, CacheLookup, Existence},
};
use async_trait::async_trait;
use chaingraph_types::{CacheValue, GraphCursor, NodeId};
use lru::LruCache;
use std::{
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

#[derive(Debug)]
struct Inner {
    entries: LruCache<String, CacheValue>,
    negatives: LruCache<String, ()>,
    timelines: LruCache<NodeId, (Instant, Vec<GraphCursor>)>,
}

/// In-process [`Cache`] made of bounded LRU maps.
///
/// Timelines expire after the configured lifetime. Entries and negatives are only evicted by
/// capacity.
#[derive(Debug)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
    timeline_ttl: Duration,
}

fn capacity(size: usize) -> NonZeroUsize {
    NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN)
}

impl MemoryCache {
    /// Creates an empty cache sized by `config`.
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity(config.max_entries)),
                negatives: LruCache::new(capacity(config.max_negatives)),
                timelines: LruCache::new(capacity(config.max_timelines)),
            }),
            timeline_ttl: config.timeline_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if no entry is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn exists(&self, key: &str) -> Result<Existence, CacheError> {
        let inner = self.lock();
        Ok(if inner.negatives.contains(key) {
            Existence::No
        } else if inner.entries.contains(key) {
            Existence::Yes
        } else {
            Existence::Unknown
        })
    }

    async fn set_not_exists(&self, key: &str) -> Result<(), CacheError> {
        self.lock().negatives.put(key.to_string(), ());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError> {
        Ok(self.lock().entries.get(key).cloned().map_or(CacheLookup::Miss, CacheLookup::Hit))
    }

    async fn set(&self, key: &str, value: CacheValue) -> Result<(), CacheError> {
        let mut inner = self.lock();
        inner.negatives.pop(key);
        inner.entries.put(key.to_string(), value);
        Ok(())
    }

    async fn get_timeline(&self, id: &NodeId) -> Result<Option<Vec<GraphCursor>>, CacheError> {
        let mut inner = self.lock();
        match inner.timelines.get(id) {
            Some((written, timeline)) if written.elapsed() <= self.timeline_ttl => {
                Ok(Some(timeline.clone()))
            }
            Some(_) => {
                inner.timelines.pop(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_timeline(
        &self,
        id: &NodeId,
        timeline: Vec<GraphCursor>,
    ) -> Result<(), CacheError> {
        self.lock().timelines.put(id.clone(), (Instant::now(), timeline));
        Ok(())
    }
}
