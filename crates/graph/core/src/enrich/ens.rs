use crate::{
    AddressUpserted, EventBus,
    chain::ChainReader,
    enrich::{EnrichError, forward::forward_addresses},
    scanner::Scanner,
};
use chaingraph_storage::{GraphDb, NameStorage, models::Addresses};
use chaingraph_types::{AddressRecord, NodeId};
use lru::LruCache;
use std::{num::NonZeroUsize, sync::Arc};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Addresses remembered as already looked up.
const LOOKED_UP: usize = 1 << 20;

fn looked_up_cache() -> LruCache<NodeId, ()> {
    LruCache::new(NonZeroUsize::new(LOOKED_UP).unwrap_or(NonZeroUsize::MIN))
}

/// Names addresses after their ENS primary name.
///
/// Replays the address table with a [`Scanner`] named [`EnsIndexer::SCANNER_NAME`], then
/// follows every address upserted by the indexer. Lookup failures are logged and skipped. A
/// name already set on an address is never replaced.
#[derive(Debug)]
pub struct EnsIndexer<R> {
    scanner: Scanner<Addresses>,
    db: Arc<GraphDb>,
    reader: Arc<R>,
    updates: broadcast::Receiver<AddressUpserted>,
    cancel: CancellationToken,
}

impl<R> EnsIndexer<R>
where
    R: ChainReader + 'static,
{
    /// Name under which the scan progress is persisted.
    pub const SCANNER_NAME: &'static str = "ens";

    /// Creates a new [`EnsIndexer`], subscribing to address upserts right away.
    pub fn new(
        db: Arc<GraphDb>,
        reader: Arc<R>,
        events: &EventBus,
        cancel: CancellationToken,
    ) -> Result<Self, EnrichError> {
        let scanner = Scanner::new(Self::SCANNER_NAME, Arc::clone(&db), cancel.clone())?;
        Ok(Self { scanner, db, reader, updates: events.subscribe_addresses(), cancel })
    }

    /// Restarts the scan from the first address.
    pub fn reset(&mut self) -> Result<(), EnrichError> {
        self.scanner.reset()?;
        Ok(())
    }

    /// Runs until cancelled. Returns the number of names stored.
    pub async fn run(self) -> Result<u64, EnrichError> {
        let Self { mut scanner, db, reader, updates, cancel } = self;
        let forwarder = tokio::spawn(forward_addresses(
            Self::SCANNER_NAME,
            updates,
            scanner.notifier(),
            |_| true,
            cancel.clone(),
        ));

        let mut looked_up = looked_up_cache();
        let mut named = 0;
        let result = loop {
            let address = match scanner.next().await {
                Ok(Some((_, address))) => address,
                Ok(None) => break Ok(named),
                Err(err) => break Err(err.into()),
            };
            match resolve(&db, reader.as_ref(), &mut looked_up, &address).await {
                Ok(true) => named += 1,
                Ok(false) => {}
                Err(err) => break Err(err),
            }
        };
        forwarder.abort();

        match &result {
            Ok(named) => info!(
                target: "ens_indexer",
                named,
                "ENS indexer cancellation requested, stopping..."
            ),
            Err(err) => warn!(target: "ens_indexer", ?err, "ENS indexer failed"),
        }
        result
    }
}

/// Looks up the name of `address` and stores it. Returns true if a name was stored.
async fn resolve<R: ChainReader>(
    db: &GraphDb,
    reader: &R,
    looked_up: &mut LruCache<NodeId, ()>,
    address: &AddressRecord,
) -> Result<bool, EnrichError> {
    if looked_up.contains(&address.id) {
        return Ok(false);
    }
    if let Some(name) = &address.name {
        if db.name_owner(name)?.is_some() {
            return Ok(false);
        }
    }
    let Some(raw) = address.id.as_address() else {
        warn!(target: "ens_indexer", id = %address.id, "Skipping address with malformed id");
        return Ok(false);
    };
    let name = match reader.lookup_name(raw).await {
        Ok(name) => name,
        Err(err) => {
            debug!(target: "ens_indexer", id = %address.id, %err, "ENS lookup failed");
            return Ok(false);
        }
    };
    looked_up.put(address.id.clone(), ());
    let Some(name) = name else {
        return Ok(false);
    };
    db.save_name(&address.id, &name)?;
    debug!(target: "ens_indexer", id = %address.id, name, "Stored ENS name");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainReaderError, MockChainReader};
    use alloy_primitives::{Address, U256};
    use chaingraph_storage::AddressStorage;
    use chaingraph_types::AddressKind;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn setup() -> (TempDir, Arc<GraphDb>) {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = GraphDb::open(&tmp_dir.path().join("graph")).expect("open db");
        (tmp_dir, Arc::new(db))
    }

    fn record(byte: u8) -> AddressRecord {
        let id = NodeId::address(Address::repeat_byte(byte));
        AddressRecord::new(id, AddressKind::Wallet, U256::from(1), 1_000)
    }

    /// Resolves `0x0101..` to `alice.eth` and fails for `0x0303..`.
    fn reader() -> Arc<MockChainReader> {
        let mut reader = MockChainReader::new();
        reader.expect_lookup_name().returning(|address| match address[0] {
            1 => Ok(Some("alice.eth".to_string())),
            3 => Err(ChainReaderError::Malformed("execution reverted".to_string())),
            _ => Ok(None),
        });
        Arc::new(reader)
    }

    async fn wait_for_name(db: &GraphDb, id: &NodeId) -> String {
        timeout(Duration::from_secs(5), async {
            loop {
                if let Some(name) = db.get_address(id).unwrap().and_then(|address| address.name) {
                    return name;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("name stored")
    }

    #[tokio::test]
    async fn test_history_addresses_are_named() {
        let (_tmp, db) = setup();
        for byte in 1..=3 {
            db.upsert_address(&record(byte)).unwrap();
        }

        let cancel = CancellationToken::new();
        let indexer =
            EnsIndexer::new(Arc::clone(&db), reader(), &EventBus::default(), cancel.clone())
                .unwrap();
        let task = tokio::spawn(indexer.run());

        assert_eq!(wait_for_name(&db, &record(1).id).await, "alice.eth");
        cancel.cancel();
        assert_eq!(task.await.unwrap().unwrap(), 1);

        assert_eq!(db.name_owner("alice.eth").unwrap(), Some(record(1).id));
        assert_eq!(db.get_address(&record(2).id).unwrap().unwrap().name, None);
        assert_eq!(db.get_address(&record(3).id).unwrap().unwrap().name, None);
    }

    #[tokio::test]
    async fn test_live_address_keeps_existing_name() {
        let (_tmp, db) = setup();
        let events = EventBus::default();
        let cancel = CancellationToken::new();
        let indexer =
            EnsIndexer::new(Arc::clone(&db), reader(), &events, cancel.clone()).unwrap();
        let task = tokio::spawn(indexer.run());

        let mut named = record(1);
        named.name = Some("old.eth".to_string());
        db.upsert_address(&named).unwrap();
        events.publish_address(AddressUpserted { address: named.clone() });
        timeout(Duration::from_secs(5), async {
            while db.name_owner("alice.eth").unwrap().is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("name owner stored");
        cancel.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(wait_for_name(&db, &named.id).await, "old.eth");
    }

    #[tokio::test]
    async fn test_indexed_names_are_not_looked_up_again() {
        let (_tmp, db) = setup();
        let mut named = record(4);
        named.name = Some("dave.eth".to_string());
        db.upsert_address(&named).unwrap();
        db.save_name(&named.id, "dave.eth").unwrap();

        let mut reader = MockChainReader::new();
        reader.expect_lookup_name().never();
        let mut looked_up = looked_up_cache();
        assert!(!resolve(&db, &reader, &mut looked_up, &named).await.unwrap());
    }
}
