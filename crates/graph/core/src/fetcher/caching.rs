use crate::{
    CachingConfig,
    cache::{Cache, CacheLookup, Existence, now_ms},
    metrics::Metrics,
};
use async_trait::async_trait;
use chaingraph_types::{
    AddressRecord, CacheValue, ChainState, FetchStep, FetchStream, GraphCursor, GraphFetcher,
    GraphObject, NodeError, NodeId, NodeKind, Relation, RelationId,
};
use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::{debug, warn};

/// Addresses fetched from upstream are cached as last seen this long ago.
const UPSTREAM_SEEN_SKEW_MS: u64 = 10_000;

/// Node lookups between two hit ratio reports.
const HIT_REPORT_INTERVAL: u64 = 1_000;

#[derive(Debug, Default)]
struct Counter {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counter {
    fn record(&self, class: &'static str, hit: bool) -> u64 {
        Metrics::record_cache_lookup(class, hit);
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total()
    }

    fn total(&self) -> u64 {
        self.hits.load(Ordering::Relaxed) + self.misses.load(Ordering::Relaxed)
    }

    fn ratio_pct(&self) -> u64 {
        let total = self.total();
        if total == 0 { 0 } else { self.hits.load(Ordering::Relaxed) * 100 / total }
    }
}

/// Hit counters of one [`CachingFetcher`], shared with its cache-only view.
#[derive(Debug, Default)]
struct CacheStats {
    address: Counter,
    address_existence: Counter,
    node: Counter,
    node_existence: Counter,
}

impl CacheStats {
    fn record_node(&self, hit: bool) {
        let total = self.node.record("node", hit);
        if total % HIT_REPORT_INTERVAL == 0 {
            debug!(
                target: "graph_cache",
                address_hit_pct = self.address.ratio_pct(),
                address_existence_hit_pct = self.address_existence.ratio_pct(),
                node_hit_pct = self.node.ratio_pct(),
                node_existence_hit_pct = self.node_existence.ratio_pct(),
                "Cache hit ratios"
            );
        }
    }
}

fn not_exists(id: &NodeId) -> NodeError {
    NodeError::not_exists("Not found", format!("{id} is cached as nonexistent"))
}

/// Checks the negative cache. Cache failures count as unknown.
async fn existence<C: Cache + ?Sized>(cache: &C, key: &str) -> Existence {
    cache.exists(key).await.unwrap_or_else(|err| {
        warn!(target: "graph_cache", ?err, key, "Cache existence check failed");
        Existence::Unknown
    })
}

/// Reads an entry. Cache failures count as misses.
async fn lookup<C: Cache + ?Sized>(cache: &C, key: &str) -> Option<CacheValue> {
    cache
        .get(key)
        .await
        .inspect_err(|err| warn!(target: "graph_cache", ?err, key, "Cache lookup failed"))
        .ok()
        .and_then(CacheLookup::into_value)
}

/// A cache write, awaited or spawned depending on [`CachingConfig::cache_is_free`].
#[derive(Debug)]
enum Write {
    Entry(String, CacheValue),
    Negative(String),
    Timeline(NodeId, Vec<GraphCursor>),
}

impl Write {
    async fn apply<C: Cache + ?Sized>(self, cache: &C) {
        let result = match &self {
            Self::Entry(key, value) => cache.set(key, value.clone()).await,
            Self::Negative(key) => cache.set_not_exists(key).await,
            Self::Timeline(id, timeline) => cache.set_timeline(id, timeline.clone()).await,
        };
        if let Err(err) = result {
            warn!(target: "graph_cache", ?err, write = ?self, "Cache write failed");
        }
    }

    async fn submit<C: Cache + ?Sized + 'static>(self, cache: &Arc<C>, config: &CachingConfig) {
        if config.cache_is_free {
            self.apply(cache.as_ref()).await;
        } else {
            let cache = Arc::clone(cache);
            tokio::spawn(async move { self.apply(cache.as_ref()).await });
        }
    }
}

/// [`GraphFetcher`] decorator answering from a [`Cache`] and falling back to an upstream fetcher.
///
/// Blocks and transactions are cached whole once fetched. Addresses are refreshed once older
/// than [`CachingConfig::staleness`], and their relations are cached one page per cursor.
/// Entities reported as nonexistent by upstream are remembered as negatives, network failures
/// never are.
#[derive(Debug)]
pub struct CachingFetcher<F: ?Sized, C: ?Sized> {
    upstream: Arc<F>,
    cache: Arc<C>,
    config: CachingConfig,
    stats: Arc<CacheStats>,
}

impl<F: ?Sized, C: ?Sized> Clone for CachingFetcher<F, C> {
    fn clone(&self) -> Self {
        Self {
            upstream: Arc::clone(&self.upstream),
            cache: Arc::clone(&self.cache),
            config: self.config,
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<F, C> CachingFetcher<F, C>
where
    F: GraphFetcher + ?Sized + 'static,
    C: Cache + ?Sized + 'static,
{
    /// Creates a new [`CachingFetcher`].
    pub fn new(upstream: Arc<F>, cache: Arc<C>, config: CachingConfig) -> Self {
        Metrics::init();
        Self { upstream, cache, config, stats: Arc::default() }
    }

    /// Returns a view of this fetcher over the same cache that never calls upstream.
    pub fn cache_only(&self) -> Self {
        let mut view = self.clone();
        view.config.cache_only = true;
        view
    }

    /// The active configuration.
    pub const fn config(&self) -> &CachingConfig {
        &self.config
    }

    /// Shared implementation of [`GraphFetcher::fetch_block`] and
    /// [`GraphFetcher::fetch_transaction`].
    fn fetch_node(&self, id: NodeId) -> FetchStream<GraphObject> {
        let upstream = Arc::clone(&self.upstream);
        let cache = Arc::clone(&self.cache);
        let stats = Arc::clone(&self.stats);
        let config = self.config;
        FetchStream::new(async_stream::stream! {
            let key = id.to_string();
            match existence(cache.as_ref(), &key).await {
                Existence::No => {
                    stats.node_existence.record("node_existence", true);
                    yield FetchStep::Done(Some(not_exists(&id)));
                    return;
                }
                Existence::Unknown => {
                    stats.node_existence.record("node_existence", false);
                }
                Existence::Yes => {}
            }

            let cached = lookup(cache.as_ref(), &key).await.filter(CacheValue::has_relations);
            stats.record_node(cached.is_some());
            if let Some(value) = cached {
                yield FetchStep::Yielded(value.into_objects());
                return;
            }
            if config.cache_only {
                return;
            }

            let mut fetch = match id.kind() {
                NodeKind::Block => upstream.fetch_block(id.clone()),
                NodeKind::Transaction => upstream.fetch_transaction(id.clone()),
                NodeKind::Address => {
                    let err = NodeError::not_exists("Not found", format!("{id} is not a node"));
                    yield FetchStep::Done(Some(err));
                    return;
                }
            };
            let mut node = None;
            let mut rels = Vec::new();
            loop {
                match fetch.next().await {
                    FetchStep::Yielded(batch) => {
                        for object in &batch {
                            match object {
                                GraphObject::Block(_) | GraphObject::Transaction(_)
                                    if object.node_id() == Some(&id) =>
                                {
                                    node = Some(object.clone());
                                }
                                other => rels.push(other.clone()),
                            }
                        }
                        yield FetchStep::Yielded(batch);
                    }
                    FetchStep::Done(Some(err)) => {
                        if err.is_not_exists() {
                            Write::Negative(key).submit(&cache, &config).await;
                        }
                        yield FetchStep::Done(Some(err));
                        return;
                    }
                    FetchStep::Done(None) => break,
                }
            }
            let value = match node {
                Some(GraphObject::Block(node)) => CacheValue::Block { node, rels },
                Some(GraphObject::Transaction(node)) => CacheValue::Transaction { node, rels },
                _ => return,
            };
            Write::Entry(key, value).submit(&cache, &config).await;
        })
    }
}

#[async_trait]
impl<F, C> GraphFetcher for CachingFetcher<F, C>
where
    F: GraphFetcher + ?Sized + 'static,
    C: Cache + ?Sized + 'static,
{
    fn fetch_address_timeline(&self, id: NodeId) -> FetchStream<GraphCursor> {
        let upstream = Arc::clone(&self.upstream);
        let cache = Arc::clone(&self.cache);
        let stats = Arc::clone(&self.stats);
        let config = self.config;
        FetchStream::new(async_stream::stream! {
            let key = id.to_string();
            match existence(cache.as_ref(), &key).await {
                Existence::No => {
                    stats.address_existence.record("address_existence", true);
                    yield FetchStep::Done(Some(not_exists(&id)));
                    return;
                }
                Existence::Unknown => {
                    stats.address_existence.record("address_existence", false);
                }
                Existence::Yes => {}
            }

            let cached = cache.get_timeline(&id).await.unwrap_or_else(|err| {
                warn!(target: "graph_cache", ?err, %id, "Timeline lookup failed");
                None
            });
            if let Some(timeline) = cached {
                yield FetchStep::Yielded(timeline);
                return;
            }
            if config.cache_only {
                return;
            }

            let mut fetch = upstream.fetch_address_timeline(id.clone());
            let mut timeline = Vec::new();
            loop {
                match fetch.next().await {
                    FetchStep::Yielded(batch) => {
                        timeline.extend(batch.iter().cloned());
                        yield FetchStep::Yielded(batch);
                    }
                    FetchStep::Done(Some(err)) => {
                        if err.is_not_exists() {
                            Write::Negative(key).submit(&cache, &config).await;
                        }
                        yield FetchStep::Done(Some(err));
                        return;
                    }
                    FetchStep::Done(None) => break,
                }
            }
            if !timeline.is_empty() {
                Write::Timeline(id, timeline).submit(&cache, &config).await;
            }
        })
    }

    fn fetch_address_rels(
        &self,
        cursor: GraphCursor,
        include_address: bool,
    ) -> FetchStream<GraphObject> {
        let upstream = Arc::clone(&self.upstream);
        let cache = Arc::clone(&self.cache);
        let stats = Arc::clone(&self.stats);
        let config = self.config;
        FetchStream::new(async_stream::stream! {
            let id = cursor.entity_id().clone();
            let key = id.to_string();
            match existence(cache.as_ref(), &key).await {
                Existence::No => {
                    stats.address_existence.record("address_existence", true);
                    yield FetchStep::Done(Some(not_exists(&id)));
                    return;
                }
                Existence::Unknown => {
                    stats.address_existence.record("address_existence", false);
                }
                Existence::Yes => {}
            }

            let cached = match lookup(cache.as_ref(), &key).await {
                Some(CacheValue::Address { node }) => Some(node),
                _ => None,
            };
            stats.address.record("address", cached.is_some());
            if include_address {
                if let Some(node) = &cached {
                    yield FetchStep::Yielded(vec![GraphObject::Address(node.clone())]);
                }
            }

            let mut current = cursor;
            let mut rels_hit = false;
            let mut partial_page = HashSet::<RelationId>::new();
            if cached.is_some() {
                loop {
                    let page = match lookup(cache.as_ref(), current.as_str()).await {
                        Some(CacheValue::RelationPage { rels }) if !rels.is_empty() => rels,
                        _ => break,
                    };
                    rels_hit = true;
                    let next = current.next_cursor(&page);
                    let complete = next != current;
                    if !complete {
                        partial_page = page.iter().map(|rel| rel.id.clone()).collect();
                    }
                    yield FetchStep::Yielded(page.into_iter().map(GraphObject::Relation).collect());
                    current = next;
                    if !complete || !config.cache_is_free {
                        break;
                    }
                }
            }

            let now = now_ms();
            let stale = cached.as_ref().is_none_or(|node| node.is_stale(now, config.staleness));
            if (!stale && rels_hit) || config.cache_only {
                return;
            }

            let mut fetch = upstream.fetch_address_rels(current.clone(), stale);
            let mut page: Vec<Relation> = Vec::new();
            loop {
                match fetch.next().await {
                    FetchStep::Yielded(batch) => {
                        let mut fresh = Vec::new();
                        for object in batch {
                            match object {
                                GraphObject::Address(node) => {
                                    let last_seen_ms = now.saturating_sub(UPSTREAM_SEEN_SKEW_MS);
                                    let node = AddressRecord { last_seen_ms, ..node };
                                    let value = CacheValue::Address { node: node.clone() };
                                    Write::Entry(node.id.to_string(), value)
                                        .submit(&cache, &config)
                                        .await;
                                    if include_address {
                                        fresh.push(GraphObject::Address(node));
                                    }
                                }
                                GraphObject::Relation(rel) => {
                                    if !partial_page.contains(&rel.id) {
                                        fresh.push(GraphObject::Relation(rel.clone()));
                                    }
                                    page.push(rel);
                                }
                                other => fresh.push(other),
                            }
                        }
                        if !fresh.is_empty() {
                            yield FetchStep::Yielded(fresh);
                        }
                    }
                    FetchStep::Done(Some(err)) => {
                        if err.is_not_exists() {
                            Write::Negative(key).submit(&cache, &config).await;
                        }
                        yield FetchStep::Done(Some(err));
                        return;
                    }
                    FetchStep::Done(None) => break,
                }
            }
            if !page.is_empty() {
                let value = CacheValue::RelationPage { rels: page };
                Write::Entry(current.as_str().to_string(), value).submit(&cache, &config).await;
            }
        })
    }

    fn fetch_block(&self, id: NodeId) -> FetchStream<GraphObject> {
        self.fetch_node(id)
    }

    fn fetch_transaction(&self, id: NodeId) -> FetchStream<GraphObject> {
        self.fetch_node(id)
    }

    async fn request_server_push(&self) -> Result<ChainState, NodeError> {
        self.upstream.request_server_push().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryCache, cache::MockCache};
    use alloy_primitives::{Address, B64, B256, U256};
    use chaingraph_types::{AddressKind, BlockRecord, PAGE_SIZE, RelationKind};
    use std::{sync::atomic::AtomicUsize, time::Duration};

    const STALENESS: Duration = Duration::from_secs(60 * 60);

    /// Upstream answering every fetch with fixed content and counting calls.
    #[derive(Debug, Default)]
    struct StubFetcher {
        calls: AtomicUsize,
        address: Option<AddressRecord>,
        rels: Vec<Relation>,
        node: Vec<GraphObject>,
        timeline: Vec<GraphCursor>,
        error: Option<NodeError>,
    }

    impl StubFetcher {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn answer<T: Send + 'static>(&self, batch: Vec<T>) -> FetchStream<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.error {
                Some(err) => FetchStream::failed(err.clone()),
                None => FetchStream::new(futures::stream::iter([FetchStep::Yielded(batch)])),
            }
        }
    }

    #[async_trait]
    impl GraphFetcher for StubFetcher {
        fn fetch_address_timeline(&self, _id: NodeId) -> FetchStream<GraphCursor> {
            self.answer(self.timeline.clone())
        }

        fn fetch_address_rels(
            &self,
            _cursor: GraphCursor,
            include_address: bool,
        ) -> FetchStream<GraphObject> {
            let address = self.address.clone().filter(|_| include_address);
            let batch = address
                .map(GraphObject::Address)
                .into_iter()
                .chain(self.rels.iter().cloned().map(GraphObject::Relation))
                .collect();
            self.answer(batch)
        }

        fn fetch_block(&self, _id: NodeId) -> FetchStream<GraphObject> {
            self.answer(self.node.clone())
        }

        fn fetch_transaction(&self, _id: NodeId) -> FetchStream<GraphObject> {
            self.answer(self.node.clone())
        }

        async fn request_server_push(&self) -> Result<ChainState, NodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChainState { latest_block_number: 9, ..Default::default() })
        }
    }

    fn address_id() -> NodeId {
        NodeId::address(Address::repeat_byte(0xaa))
    }

    fn address(last_seen_ms: u64) -> AddressRecord {
        AddressRecord::new(address_id(), AddressKind::Wallet, U256::from(5), last_seen_ms)
    }

    fn send(n: u8) -> Relation {
        let tx = NodeId::transaction(B256::repeat_byte(n));
        Relation::new(RelationId::new(RelationKind::Send, address_id(), tx), u64::from(n), None)
    }

    fn block(number: u64) -> Vec<GraphObject> {
        let id = NodeId::block(number);
        let record = BlockRecord {
            id: id.clone(),
            number,
            hash: B256::repeat_byte(1),
            parent_hash: B256::ZERO,
            miner: Address::repeat_byte(2),
            timestamp: 1_000,
            nonce: B64::ZERO,
            difficulty: U256::ZERO,
            gas_limit: 30_000_000,
            gas_used: 21_000,
            extra_data: Default::default(),
        };
        let miner = NodeId::address(Address::repeat_byte(2));
        vec![
            GraphObject::Block(record),
            GraphObject::Relation(Relation::new(
                RelationId::new(RelationKind::MinedBy, id, miner.clone()),
                1_000,
                None,
            )),
            GraphObject::Reference(miner),
        ]
    }

    fn config(cache_is_free: bool) -> CachingConfig {
        CachingConfig { staleness: STALENESS, cache_is_free, cache_only: false }
    }

    fn fetcher(
        upstream: StubFetcher,
        cache: Arc<MemoryCache>,
    ) -> (Arc<StubFetcher>, CachingFetcher<StubFetcher, MemoryCache>) {
        let upstream = Arc::new(upstream);
        (Arc::clone(&upstream), CachingFetcher::new(upstream, cache, config(true)))
    }

    async fn seed_address(cache: &MemoryCache, last_seen_ms: u64) {
        let start = GraphCursor::start(&address_id());
        cache
            .set(&address_id().to_string(), CacheValue::Address { node: address(last_seen_ms) })
            .await
            .unwrap();
        cache.set(start.as_str(), CacheValue::RelationPage { rels: vec![send(1)] }).await.unwrap();
    }

    #[tokio::test]
    async fn test_fresh_address_with_cached_page_skips_upstream() {
        let cache = Arc::new(MemoryCache::default());
        let margin = 5_000;
        seed_address(&cache, now_ms() - STALENESS.as_millis() as u64 + margin).await;
        let (upstream, fetcher) = fetcher(StubFetcher::default(), cache);

        let start = GraphCursor::start(&address_id());
        let (objects, err) = fetcher.fetch_address_rels(start, false).collect_all().await;
        assert_eq!(err, None);
        assert_eq!(objects, vec![GraphObject::Relation(send(1))]);
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_address_is_refreshed() {
        let cache = Arc::new(MemoryCache::default());
        let margin = 5_000;
        seed_address(&cache, now_ms() - STALENESS.as_millis() as u64 - margin).await;
        let refreshed = address(0);
        let (upstream, fetcher) = fetcher(
            StubFetcher {
                address: Some(refreshed),
                rels: vec![send(1), send(2)],
                ..Default::default()
            },
            Arc::clone(&cache),
        );

        let start = GraphCursor::start(&address_id());
        let (objects, err) = fetcher.fetch_address_rels(start.clone(), true).collect_all().await;
        assert_eq!(err, None);
        assert_eq!(upstream.calls(), 1);
        // stale snapshot, the cached page, the refreshed snapshot, then only the new relation
        assert_eq!(objects.len(), 4);
        assert!(matches!(objects[0], GraphObject::Address(_)));
        assert_eq!(objects[1], GraphObject::Relation(send(1)));
        assert!(matches!(&objects[2], GraphObject::Address(node)
            if !node.is_stale(now_ms(), STALENESS)));
        assert_eq!(objects[3], GraphObject::Relation(send(2)));

        assert_eq!(
            cache.get(start.as_str()).await.unwrap(),
            CacheLookup::Hit(CacheValue::RelationPage { rels: vec![send(1), send(2)] })
        );
    }

    #[tokio::test]
    async fn test_address_miss_fills_cache() {
        let cache = Arc::new(MemoryCache::default());
        let (upstream, fetcher) = fetcher(
            StubFetcher { address: Some(address(0)), rels: vec![send(1)], ..Default::default() },
            cache,
        );
        let start = GraphCursor::start(&address_id());

        let (first, _) = fetcher.fetch_address_rels(start.clone(), true).collect_all().await;
        assert_eq!(first.len(), 2);
        let (second, err) = fetcher.fetch_address_rels(start, true).collect_all().await;
        assert_eq!(err, None);
        assert_eq!(second, first);
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_full_cached_pages_are_walked_when_cache_is_free() {
        let cache = Arc::new(MemoryCache::default());
        seed_address(&cache, now_ms()).await;
        let start = GraphCursor::start(&address_id());
        let full: Vec<_> = (1..=PAGE_SIZE as u8).map(send).collect();
        let next = start.next_cursor(&full);
        cache.set(start.as_str(), CacheValue::RelationPage { rels: full }).await.unwrap();
        cache.set(next.as_str(), CacheValue::RelationPage { rels: vec![send(200)] }).await.unwrap();
        let (upstream, fetcher) = fetcher(StubFetcher::default(), cache);

        let (objects, err) = fetcher.fetch_address_rels(start, false).collect_all().await;
        assert_eq!(err, None);
        assert_eq!(objects.len(), PAGE_SIZE + 1);
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_not_exists_is_cached() {
        let cache = Arc::new(MemoryCache::default());
        let (upstream, fetcher) = fetcher(
            StubFetcher {
                error: Some(NodeError::not_exists("Block not found", "beyond head")),
                ..Default::default()
            },
            cache,
        );

        for _ in 0..2 {
            let (objects, err) = fetcher.fetch_block(NodeId::block(1_000)).collect_all().await;
            assert!(objects.is_empty());
            assert!(err.is_some_and(|err| err.is_not_exists()));
        }
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_address_timeline_is_cached_as_negative() {
        let cache = Arc::new(MemoryCache::default());
        let (upstream, fetcher) = fetcher(
            StubFetcher {
                error: Some(NodeError::not_exists("Address not found", "never indexed")),
                ..Default::default()
            },
            Arc::clone(&cache),
        );

        for _ in 0..2 {
            let (cursors, err) = fetcher.fetch_address_timeline(address_id()).collect_all().await;
            assert!(cursors.is_empty());
            assert!(err.is_some_and(|err| err.is_not_exists()));
        }
        assert_eq!(upstream.calls(), 1);

        let start = GraphCursor::start(&address_id());
        let (_, err) = fetcher.fetch_address_rels(start, true).collect_all().await;
        assert!(err.is_some_and(|err| err.is_not_exists()));
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_network_error_is_not_cached() {
        let cache = Arc::new(MemoryCache::default());
        let (upstream, fetcher) = fetcher(
            StubFetcher {
                error: Some(NodeError::network("Try again", "connection reset")),
                ..Default::default()
            },
            cache,
        );

        for _ in 0..2 {
            let (_, err) = fetcher.fetch_block(NodeId::block(7)).collect_all().await;
            assert!(err.is_some_and(|err| err.is_network()));
        }
        assert_eq!(upstream.calls(), 2);
    }

    #[tokio::test]
    async fn test_block_is_cached_whole() {
        let cache = Arc::new(MemoryCache::default());
        let (upstream, fetcher) =
            fetcher(StubFetcher { node: block(7), ..Default::default() }, cache);

        let (first, _) = fetcher.fetch_block(NodeId::block(7)).collect_all().await;
        let (second, err) = fetcher.fetch_block(NodeId::block(7)).collect_all().await;
        assert_eq!(err, None);
        assert_eq!(first, block(7));
        assert_eq!(second, first);
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_node_without_relations_is_refetched() {
        let cache = Arc::new(MemoryCache::default());
        let GraphObject::Block(node) = block(7).remove(0) else { unreachable!() };
        let value = CacheValue::Block { node, rels: Vec::new() };
        cache.set(&NodeId::block(7).to_string(), value).await.unwrap();
        let (upstream, fetcher) =
            fetcher(StubFetcher { node: block(7), ..Default::default() }, cache);

        let (objects, _) = fetcher.fetch_block(NodeId::block(7)).collect_all().await;
        assert_eq!(objects, block(7));
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeline_is_cached() {
        let cache = Arc::new(MemoryCache::default());
        let timeline = vec![GraphCursor::start(&address_id())];
        let (upstream, fetcher) = fetcher(
            StubFetcher { timeline: timeline.clone(), ..Default::default() },
            Arc::clone(&cache),
        );

        for _ in 0..2 {
            let (cursors, err) = fetcher.fetch_address_timeline(address_id()).collect_all().await;
            assert_eq!(err, None);
            assert_eq!(cursors, timeline);
        }
        assert_eq!(upstream.calls(), 1);
        assert_eq!(cache.get_timeline(&address_id()).await.unwrap(), Some(timeline));
    }

    #[tokio::test]
    async fn test_cache_only_never_calls_upstream() {
        let cache = Arc::new(MemoryCache::default());
        let (upstream, fetcher) = fetcher(
            StubFetcher { node: block(7), address: Some(address(0)), ..Default::default() },
            cache,
        );
        let view = fetcher.cache_only();

        let (objects, err) = view.fetch_block(NodeId::block(7)).collect_all().await;
        assert!(objects.is_empty());
        assert_eq!(err, None);
        let (objects, err) = view
            .fetch_address_rels(GraphCursor::start(&address_id()), true)
            .collect_all()
            .await;
        assert!(objects.is_empty());
        assert_eq!(err, None);
        let (cursors, _) = view.fetch_address_timeline(address_id()).collect_all().await;
        assert!(cursors.is_empty());
        assert_eq!(upstream.calls(), 0);

        // the view shares the cache of its parent
        fetcher.fetch_block(NodeId::block(7)).collect_all().await;
        let (objects, _) = view.fetch_block(NodeId::block(7)).collect_all().await;
        assert_eq!(objects, block(7));
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_failures_fall_through_to_upstream() {
        let mut cache = MockCache::new();
        cache
            .expect_exists()
            .returning(|_| Err(serde_json::from_str::<u8>("x").unwrap_err().into()));
        cache.expect_get().returning(|_| Ok(CacheLookup::Miss));
        cache.expect_set().times(1).returning(|_, _| Ok(()));
        let upstream = Arc::new(StubFetcher { node: block(3), ..Default::default() });
        let fetcher = CachingFetcher::new(Arc::clone(&upstream), Arc::new(cache), config(true));

        let (objects, err) = fetcher.fetch_block(NodeId::block(3)).collect_all().await;
        assert_eq!(err, None);
        assert_eq!(objects, block(3));
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_server_push_passes_through() {
        let (upstream, fetcher) =
            fetcher(StubFetcher::default(), Arc::new(MemoryCache::default()));
        assert_eq!(fetcher.request_server_push().await.unwrap().latest_block_number, 9);
        assert_eq!(upstream.calls(), 1);
    }
}
