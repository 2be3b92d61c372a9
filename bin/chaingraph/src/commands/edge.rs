//! Edge Subcommand

use crate::flags::GlobalArgs;
use chaingraph_core::{
    Cache, CachingConfig, CachingFetcher, DiskCache, MemoryCache, MemoryCacheConfig, RedisCache,
    RedisCacheConfig,
};
use chaingraph_rpc::{RemoteFetcher, RemoteFetcherConfig};
use chaingraph_service::{GraphService, RpcActor};
use clap::{Parser, ValueEnum};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Storage backing the edge cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackend {
    /// Bounded in-process LRU.
    Memory,
    /// Cache tables of a local database.
    Disk,
    /// Shared Redis server.
    Redis,
}

/// The `edge` Subcommand
///
/// Serves a remote graph server through a cache.
///
/// # Usage
///
/// ```sh
/// chaingraph edge --upstream.url ws://indexer:9545 --cache redis [OPTIONS]
/// ```
#[derive(Parser, Debug, Clone)]
#[command(about = "Serves a remote graph through a cache")]
pub struct EdgeCommand {
    /// WebSocket url of the upstream graph server.
    #[arg(long = "upstream.url", env = "CHAINGRAPH_UPSTREAM_URL")]
    pub upstream_url: String,
    /// Seconds to wait for one upstream frame or call.
    #[arg(long = "upstream.timeout", default_value_t = 30, env = "CHAINGRAPH_UPSTREAM_TIMEOUT")]
    pub upstream_timeout_secs: u64,
    /// Address the graph server listens on.
    #[arg(long = "serve.addr", default_value = "0.0.0.0:9546", env = "CHAINGRAPH_SERVE_ADDR")]
    pub serve_addr: SocketAddr,
    /// Cache backend.
    #[arg(
        long = "cache",
        value_enum,
        default_value_t = CacheBackend::Memory,
        env = "CHAINGRAPH_CACHE"
    )]
    pub cache: CacheBackend,
    /// Entries kept by the memory cache.
    #[arg(long = "cache.entries", default_value_t = 20_000, env = "CHAINGRAPH_CACHE_ENTRIES")]
    pub cache_entries: usize,
    /// Url of the Redis server of the redis cache.
    #[arg(
        long = "redis.url",
        default_value = "redis://127.0.0.1:6379",
        env = "CHAINGRAPH_REDIS_URL"
    )]
    pub redis_url: String,
    /// Seconds after which a cached address is refreshed from upstream.
    #[arg(
        long = "cache.staleness",
        default_value_t = 32 * 60 * 60,
        env = "CHAINGRAPH_CACHE_STALENESS"
    )]
    pub staleness_secs: u64,
    /// Answer from the cache only, never calling upstream.
    #[arg(long = "cache.only", env = "CHAINGRAPH_CACHE_ONLY")]
    pub cache_only: bool,
}

impl EdgeCommand {
    /// The [`CachingConfig`] selected by the flags.
    pub const fn caching_config(&self) -> CachingConfig {
        CachingConfig {
            staleness: Duration::from_secs(self.staleness_secs),
            cache_is_free: matches!(self.cache, CacheBackend::Memory),
            cache_only: self.cache_only,
        }
    }

    async fn open_cache(&self, global: &GlobalArgs) -> anyhow::Result<Arc<dyn Cache>> {
        let cache: Arc<dyn Cache> = match self.cache {
            CacheBackend::Memory => Arc::new(MemoryCache::new(MemoryCacheConfig {
                max_entries: self.cache_entries,
                ..Default::default()
            })),
            CacheBackend::Disk => Arc::new(DiskCache::new(global.open_cache()?)),
            CacheBackend::Redis => {
                Arc::new(RedisCache::connect(RedisCacheConfig::new(self.redis_url.clone())).await?)
            }
        };
        Ok(cache)
    }

    /// Run the Edge subcommand.
    pub async fn run(self, global: &GlobalArgs, cancel: CancellationToken) -> anyhow::Result<()> {
        let cache = self.open_cache(global).await?;
        let config = RemoteFetcherConfig {
            call_timeout: Duration::from_secs(self.upstream_timeout_secs),
            ..RemoteFetcherConfig::new(self.upstream_url.clone())
        };
        let upstream = Arc::new(RemoteFetcher::connect(config).await?);
        info!(
            target: "chaingraph",
            upstream = %self.upstream_url,
            cache = ?self.cache,
            addr = %self.serve_addr,
            "Serving cached graph"
        );

        let fetcher = Arc::new(CachingFetcher::new(upstream, cache, self.caching_config()));
        let mut service = GraphService::new(cancel.clone());
        service.spawn("rpc", RpcActor::new(self.serve_addr, fetcher, cancel));
        service.run().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("memory", CacheBackend::Memory, true)]
    #[case("disk", CacheBackend::Disk, false)]
    #[case("redis", CacheBackend::Redis, false)]
    fn test_caching_config(
        #[case] flag: &str,
        #[case] backend: CacheBackend,
        #[case] cache_is_free: bool,
    ) {
        let cmd = EdgeCommand::try_parse_from([
            "edge",
            "--upstream.url",
            "ws://localhost:9545",
            "--cache",
            flag,
            "--cache.staleness",
            "60",
        ])
        .unwrap();
        assert_eq!(cmd.cache, backend);
        assert_eq!(
            cmd.caching_config(),
            CachingConfig { staleness: Duration::from_secs(60), cache_is_free, cache_only: false }
        );
    }
}
