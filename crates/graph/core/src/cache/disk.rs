use crate::cache::{Cache, CacheError, CacheLookup, Existence, now_ms};
use async_trait::async_trait;
use chaingraph_storage::{
    DbRead, DbWrite, GraphDb,
    models::{CacheEntries, CacheNegatives, CacheTimelines},
};
use chaingraph_types::{CacheValue, GraphCursor, NodeId};
use std::{sync::Arc, time::Duration};
use tracing::trace;

/// [`Cache`] persisted in the cache tables of a [`GraphDb`].
///
/// Negatives expire after a configurable lifetime since an address may appear on chain later.
#[derive(Debug, Clone)]
pub struct DiskCache {
    db: Arc<GraphDb>,
    negative_ttl: Duration,
}

impl DiskCache {
    /// Default lifetime of a negative.
    pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

    /// Creates a cache over `db`.
    pub const fn new(db: Arc<GraphDb>) -> Self {
        Self { db, negative_ttl: Self::DEFAULT_NEGATIVE_TTL }
    }

    /// Sets the lifetime of negatives.
    pub const fn with_negative_ttl(mut self, negative_ttl: Duration) -> Self {
        self.negative_ttl = negative_ttl;
        self
    }

    fn is_negative(&self, key: &str) -> Result<bool, CacheError> {
        let Some(written_ms) = self.db.get::<CacheNegatives>(key)? else {
            return Ok(false);
        };
        Ok(now_ms().saturating_sub(written_ms) <= self.negative_ttl.as_millis() as u64)
    }
}

#[async_trait]
impl Cache for DiskCache {
    async fn exists(&self, key: &str) -> Result<Existence, CacheError> {
        if self.is_negative(key)? {
            return Ok(Existence::No);
        }
        Ok(if self.db.exists::<CacheEntries>(key)? { Existence::Yes } else { Existence::Unknown })
    }

    async fn set_not_exists(&self, key: &str) -> Result<(), CacheError> {
        let key = key.to_string();
        let written_ms = now_ms();
        self.db.transaction_async(move |tx| tx.put::<CacheNegatives>(&key, &written_ms)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError> {
        let value = self.db.get::<CacheEntries>(key)?;
        trace!(target: "graph_cache", key, hit = value.is_some(), "Disk cache lookup");
        Ok(value.map_or(CacheLookup::Miss, CacheLookup::Hit))
    }

    async fn set(&self, key: &str, value: CacheValue) -> Result<(), CacheError> {
        let key = key.to_string();
        self.db
            .transaction_async(move |tx| {
                tx.delete::<CacheNegatives>(&key)?;
                tx.put::<CacheEntries>(&key, &value)
            })
            .await?;
        Ok(())
    }

    async fn get_timeline(&self, id: &NodeId) -> Result<Option<Vec<GraphCursor>>, CacheError> {
        Ok(self.db.get::<CacheTimelines>(&id.to_string())?)
    }

    async fn set_timeline(
        &self,
        id: &NodeId,
        timeline: Vec<GraphCursor>,
    ) -> Result<(), CacheError> {
        let key = id.to_string();
        self.db.transaction_async(move |tx| tx.put::<CacheTimelines>(&key, &timeline)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use chaingraph_types::{AddressKind, AddressRecord};
    use tempfile::TempDir;

    fn open() -> (TempDir, DiskCache) {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = GraphDb::open(&tmp_dir.path().join("cache")).expect("open db");
        (tmp_dir, DiskCache::new(Arc::new(db)))
    }

    fn address() -> (NodeId, CacheValue) {
        let id = NodeId::address(Address::repeat_byte(7));
        let node = AddressRecord::new(id.clone(), AddressKind::Contract, U256::from(3), 1_000);
        (id, CacheValue::Address { node })
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("cache");
        let (id, value) = address();
        {
            let cache = DiskCache::new(Arc::new(GraphDb::open(&path).unwrap()));
            cache.set(&id.to_string(), value.clone()).await.unwrap();
            cache.set_timeline(&id, vec![GraphCursor::start(&id)]).await.unwrap();
        }
        let cache = DiskCache::new(Arc::new(GraphDb::open(&path).unwrap()));
        assert_eq!(cache.get(&id.to_string()).await.unwrap(), CacheLookup::Hit(value));
        assert_eq!(cache.get_timeline(&id).await.unwrap(), Some(vec![GraphCursor::start(&id)]));
    }

    #[tokio::test]
    async fn test_negative_then_set() {
        let (_tmp, cache) = open();
        let (id, value) = address();
        let key = id.to_string();
        assert_eq!(cache.exists(&key).await.unwrap(), Existence::Unknown);

        cache.set_not_exists(&key).await.unwrap();
        assert_eq!(cache.exists(&key).await.unwrap(), Existence::No);

        cache.set(&key, value).await.unwrap();
        assert_eq!(cache.exists(&key).await.unwrap(), Existence::Yes);
    }

    #[tokio::test]
    async fn test_negative_expires() {
        let (_tmp, cache) = open();
        let cache = cache.with_negative_ttl(Duration::ZERO);
        let key = address().0.to_string();
        cache.set_not_exists(&key).await.unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.exists(&key).await.unwrap(), Existence::Unknown);
    }
}
