use crate::{
    RedisCacheConfig,
    cache::{Cache, CacheError, CacheLookup, Existence},
};
use async_trait::async_trait;
use chaingraph_types::{CacheValue, GraphCursor, NodeId, NodeKind, is_valid_cursor};
use redis::{AsyncCommands as _, aio::ConnectionManager};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Cuckoo filter holding address negatives.
const ADDRESS_FILTER: &str = "ab";

/// Cuckoo filter holding block and transaction negatives.
const NODE_FILTER: &str = "tb";

const TIMELINE_PREFIX: &str = "timeline:";

/// Returns the negative filter responsible for `key`. Cursors have none.
fn filter_for(key: &str) -> Option<&'static str> {
    if is_valid_cursor(key) {
        return None;
    }
    match key.parse::<NodeId>().ok()?.kind() {
        NodeKind::Address => Some(ADDRESS_FILTER),
        NodeKind::Block | NodeKind::Transaction => Some(NODE_FILTER),
    }
}

/// [`Cache`] shared between processes through Redis.
///
/// Values are JSON strings with a lifetime depending on their mutability. Negatives live in
/// RedisBloom cuckoo filters, one for addresses and one for blocks and transactions, reserved
/// when the cache connects.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    config: RedisCacheConfig,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").field("config", &self.config).finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connects to the server of `config` and reserves the negative filters.
    pub async fn connect(config: RedisCacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.url.as_str())?;
        let conn = client.get_connection_manager().await?;
        info!(target: "graph_cache", url = %config.url, "Connected to Redis cache");
        let cache = Self { conn, config };
        let RedisCacheConfig {
            address_filter_capacity,
            address_bucket_size,
            node_filter_capacity,
            node_bucket_size,
            ..
        } = cache.config;
        cache.reserve(ADDRESS_FILTER, address_filter_capacity, address_bucket_size).await?;
        cache.reserve(NODE_FILTER, node_filter_capacity, node_bucket_size).await?;
        Ok(cache)
    }

    async fn reserve(
        &self,
        filter: &str,
        capacity: u64,
        bucket_size: u64,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let reserved = redis::cmd("CF.RESERVE")
            .arg(filter)
            .arg(capacity)
            .arg("BUCKETSIZE")
            .arg(bucket_size)
            .query_async::<()>(&mut conn)
            .await;
        match reserved {
            Ok(()) => {
                info!(
                    target: "graph_cache",
                    filter,
                    capacity,
                    bucket_size,
                    "Reserved negative filter"
                );
                Ok(())
            }
            Err(err) if err.to_string().contains("exists") => {
                debug!(target: "graph_cache", filter, "Negative filter already reserved");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn filter_contains(&self, filter: &str, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        Ok(redis::cmd("CF.EXISTS").arg(filter).arg(key).query_async::<bool>(&mut conn).await?)
    }

    const fn ttl_for(&self, value: &CacheValue) -> Duration {
        match value {
            CacheValue::Address { .. } | CacheValue::RelationPage { .. } => self.config.mutable_ttl,
            CacheValue::Block { .. } | CacheValue::Transaction { .. } => self.config.immutable_ttl,
        }
    }

    async fn set_json(&self, key: &str, json: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        if ttl.is_zero() {
            conn.set::<_, _, ()>(key, json).await?;
        } else {
            conn.set_ex::<_, _, ()>(key, json, ttl.as_secs()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn exists(&self, key: &str) -> Result<Existence, CacheError> {
        if let Some(filter) = filter_for(key) {
            if self.filter_contains(filter, key).await? {
                return Ok(Existence::No);
            }
        }
        let mut conn = self.conn.clone();
        Ok(if conn.exists::<_, bool>(key).await? { Existence::Yes } else { Existence::Unknown })
    }

    async fn set_not_exists(&self, key: &str) -> Result<(), CacheError> {
        let Some(filter) = filter_for(key) else {
            return Ok(());
        };
        let mut conn = self.conn.clone();
        redis::cmd("CF.ADD").arg(filter).arg(key).query_async::<bool>(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        trace!(target: "graph_cache", key, hit = raw.is_some(), "Redis cache lookup");
        Ok(match raw {
            Some(json) => CacheLookup::Hit(serde_json::from_str(&json)?),
            None => CacheLookup::Miss,
        })
    }

    async fn set(&self, key: &str, value: CacheValue) -> Result<(), CacheError> {
        let ttl = self.ttl_for(&value);
        self.set_json(key, serde_json::to_string(&value)?, ttl).await?;
        if let Some(filter) = filter_for(key) {
            if self.filter_contains(filter, key).await? {
                let mut conn = self.conn.clone();
                redis::cmd("CF.DEL").arg(filter).arg(key).query_async::<bool>(&mut conn).await?;
            }
        }
        Ok(())
    }

    async fn get_timeline(&self, id: &NodeId) -> Result<Option<Vec<GraphCursor>>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(format!("{TIMELINE_PREFIX}{id}")).await?;
        Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    async fn set_timeline(
        &self,
        id: &NodeId,
        timeline: Vec<GraphCursor>,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(&timeline)?;
        self.set_json(&format!("{TIMELINE_PREFIX}{id}"), json, self.config.timeline_ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};

    #[test]
    fn test_filter_per_entity_class() {
        let address = NodeId::address(Address::repeat_byte(1));
        assert_eq!(filter_for(&address.to_string()), Some(ADDRESS_FILTER));
        assert_eq!(filter_for(&NodeId::block(12).to_string()), Some(NODE_FILTER));
        assert_eq!(
            filter_for(&NodeId::transaction(B256::repeat_byte(2)).to_string()),
            Some(NODE_FILTER)
        );
        assert_eq!(filter_for(GraphCursor::start(&address).as_str()), None);
        assert_eq!(filter_for("garbage"), None);
    }
}
