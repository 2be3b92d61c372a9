//! Main database access structure and batch contexts.

use crate::{
    error::StorageError,
    models::{TABLES, Table},
    providers::{
        AddressProvider, ChainStateProvider, CodeProvider, NameProvider, RelationProvider,
        ScanStateProvider,
    },
    traits::{
        AddressStorage, ChainStateStorage, CodeStorage, GraphStorageWriter, NameStorage,
        RelationStorage, ScanStateStorage,
    },
    tx::{DbRead, DbWrite},
    types::{IndexedBatch, StoredBatch},
};
use alloy_primitives::B256;
use chaingraph_types::{AddressRecord, ChainState, GraphCursor, NodeId, Relation, ScanState};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode, Direction,
    IteratorMode, MultiThreaded, Options, WriteBatch,
};
use std::{cell::RefCell, path::Path, sync::Arc};
use tracing::{debug, error};

type Db = DBWithThreadMode<MultiThreaded>;

/// Manages the RocksDB instance holding the whole graph.
/// Provides batched access to data via providers.
#[derive(Debug)]
pub struct GraphDb {
    db: Db,
}

impl GraphDb {
    /// Creates or opens a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let mut cf_opts = Options::default();
        cf_opts.set_compression_type(DBCompressionType::Snappy);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let families =
            TABLES.iter().map(|name| ColumnFamilyDescriptor::new(*name, cf_opts.clone()));
        let db = Db::open_cf_descriptors(&db_opts, path, families).inspect_err(|err| {
            error!(
                target: "graph_storage",
                path = %path.display(),
                ?err,
                "Failed to open database"
            );
        })?;
        debug!(target: "graph_storage", path = %path.display(), "Opened graph database");
        Ok(Self { db })
    }

    fn cf<T: Table>(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db.cf_handle(T::NAME).ok_or(StorageError::MissingTable(T::NAME))
    }

    /// Runs `f` against a write batch and commits it atomically.
    ///
    /// Reads made through the batch observe committed state only, not the batch's own pending
    /// writes. Nothing is written if `f` fails.
    pub fn transaction<F, R>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&GraphBatch<'_>) -> Result<R, StorageError>,
    {
        let batch = GraphBatch { db: self, batch: RefCell::new(WriteBatch::default()) };
        let result = f(&batch)?;
        self.db.write(batch.batch.into_inner()).inspect_err(|err| {
            error!(target: "graph_storage", ?err, "Failed to commit write batch");
        })?;
        Ok(result)
    }

    /// Runs [`Self::transaction`] on the blocking thread pool.
    pub async fn transaction_async<F, R>(self: &Arc<Self>, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&GraphBatch<'_>) -> Result<R, StorageError> + Send + 'static,
        R: Send + 'static,
    {
        let db = Arc::clone(self);
        tokio::task::spawn_blocking(move || db.transaction(f)).await?
    }

    fn iter_from<T: Table>(
        &self,
        start: Option<&str>,
        mut visit: impl FnMut(String, Box<[u8]>) -> Result<bool, StorageError>,
    ) -> Result<(), StorageError> {
        let cf = self.cf::<T>()?;
        let mode = match start {
            Some(key) => IteratorMode::From(key.as_bytes(), Direction::Forward),
            None => IteratorMode::Start,
        };
        for item in self.db.iterator_cf(&cf, mode) {
            let (key, value) = item?;
            let key = decode_key::<T>(&key)?;
            if !visit(key, value)? {
                break;
            }
        }
        Ok(())
    }
}

fn decode_key<T: Table>(key: &[u8]) -> Result<String, StorageError> {
    std::str::from_utf8(key).map(str::to_string).map_err(|_| StorageError::MalformedKey {
        table: T::NAME,
        key: String::from_utf8_lossy(key).into_owned(),
    })
}

impl DbRead for GraphDb {
    fn get<T: Table>(&self, key: &str) -> Result<Option<T::Value>, StorageError> {
        let cf = self.cf::<T>()?;
        match self.db.get_pinned_cf(&cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn exists<T: Table>(&self, key: &str) -> Result<bool, StorageError> {
        let cf = self.cf::<T>()?;
        Ok(self.db.get_pinned_cf(&cf, key.as_bytes())?.is_some())
    }

    fn range_from<T: Table>(
        &self,
        start: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, T::Value)>, StorageError> {
        let mut entries = Vec::new();
        if limit == 0 {
            return Ok(entries);
        }
        self.iter_from::<T>(start, |key, value| {
            entries.push((key, serde_json::from_slice(&value)?));
            Ok(entries.len() < limit)
        })?;
        Ok(entries)
    }

    fn keys_from<T: Table>(
        &self,
        start: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        if limit == 0 {
            return Ok(keys);
        }
        let mut skipped = 0;
        self.iter_from::<T>(Some(start), |key, _| {
            if skipped < offset {
                skipped += 1;
                return Ok(true);
            }
            keys.push(key);
            Ok(keys.len() < limit)
        })?;
        Ok(keys)
    }
}

impl DbWrite for GraphDb {
    fn put<T: Table>(&self, key: &str, value: &T::Value) -> Result<(), StorageError> {
        let cf = self.cf::<T>()?;
        self.db.put_cf(&cf, key.as_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn delete<T: Table>(&self, key: &str) -> Result<(), StorageError> {
        let cf = self.cf::<T>()?;
        self.db.delete_cf(&cf, key.as_bytes())?;
        Ok(())
    }
}

/// A pending atomic write batch. Reads go to the committed state of the database.
pub struct GraphBatch<'db> {
    db: &'db GraphDb,
    batch: RefCell<WriteBatch>,
}

impl std::fmt::Debug for GraphBatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBatch").field("pending", &self.batch.borrow().len()).finish()
    }
}

impl DbRead for GraphBatch<'_> {
    fn get<T: Table>(&self, key: &str) -> Result<Option<T::Value>, StorageError> {
        self.db.get::<T>(key)
    }

    fn exists<T: Table>(&self, key: &str) -> Result<bool, StorageError> {
        self.db.exists::<T>(key)
    }

    fn range_from<T: Table>(
        &self,
        start: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, T::Value)>, StorageError> {
        self.db.range_from::<T>(start, limit)
    }

    fn keys_from<T: Table>(
        &self,
        start: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, StorageError> {
        self.db.keys_from::<T>(start, offset, limit)
    }
}

impl DbWrite for GraphBatch<'_> {
    fn put<T: Table>(&self, key: &str, value: &T::Value) -> Result<(), StorageError> {
        let cf = self.db.cf::<T>()?;
        self.batch.borrow_mut().put_cf(&cf, key.as_bytes(), serde_json::to_vec(value)?);
        Ok(())
    }

    fn delete<T: Table>(&self, key: &str) -> Result<(), StorageError> {
        let cf = self.db.cf::<T>()?;
        self.batch.borrow_mut().delete_cf(&cf, key.as_bytes());
        Ok(())
    }
}

impl AddressStorage for GraphDb {
    fn get_address(&self, id: &NodeId) -> Result<Option<AddressRecord>, StorageError> {
        AddressProvider::new(self).get_address(id)
    }

    fn upsert_address(&self, incoming: &AddressRecord) -> Result<AddressRecord, StorageError> {
        self.transaction(|batch| AddressProvider::new(batch).upsert_address(incoming))
    }
}

impl RelationStorage for GraphDb {
    fn relations_after(
        &self,
        cursor: &GraphCursor,
        limit: usize,
    ) -> Result<Vec<Relation>, StorageError> {
        RelationProvider::new(self).relations_after(cursor, limit)
    }

    fn relation_timeline(
        &self,
        id: &NodeId,
        max_cursors: usize,
    ) -> Result<Vec<GraphCursor>, StorageError> {
        RelationProvider::new(self).relation_timeline(id, max_cursors)
    }
}

impl ChainStateStorage for GraphDb {
    fn chain_state(&self) -> Result<Option<ChainState>, StorageError> {
        ChainStateProvider::new(self).chain_state()
    }
}

impl ScanStateStorage for GraphDb {
    fn scan_state(&self, name: &str) -> Result<ScanState, StorageError> {
        ScanStateProvider::new(self).scan_state(name)
    }

    fn save_scan_state(&self, name: &str, state: &ScanState) -> Result<(), StorageError> {
        ScanStateProvider::new(self).save_scan_state(name, state)
    }

    fn clear_scan_state(&self, name: &str) -> Result<(), StorageError> {
        ScanStateProvider::new(self).clear_scan_state(name)
    }
}

impl CodeStorage for GraphDb {
    fn code_hash(&self, id: &NodeId) -> Result<Option<B256>, StorageError> {
        CodeProvider::new(self).code_hash(id)
    }

    fn save_code_hash(&self, id: &NodeId, hash: B256) -> Result<(), StorageError> {
        self.transaction(|batch| CodeProvider::new(batch).save_code_hash(id, hash))
    }

    fn contract_clones(&self, id: &NodeId) -> Result<Vec<NodeId>, StorageError> {
        CodeProvider::new(self).contract_clones(id)
    }
}

impl NameStorage for GraphDb {
    fn name_owner(&self, name: &str) -> Result<Option<NodeId>, StorageError> {
        NameProvider::new(self).name_owner(name)
    }

    fn save_name(&self, id: &NodeId, name: &str) -> Result<Option<AddressRecord>, StorageError> {
        self.transaction(|batch| NameProvider::new(batch).save_name(id, name))
    }
}

impl GraphStorageWriter for GraphDb {
    fn store_graph_batch(&self, batch: IndexedBatch) -> Result<StoredBatch, StorageError> {
        self.transaction(|tx| {
            let addresses = AddressProvider::new(tx).upsert_addresses(&batch.addresses)?;
            let relations = RelationProvider::new(tx).insert_relations(&batch.relations)?;
            ChainStateProvider::new(tx).save_chain_state(&batch.chain_state)?;
            Ok(StoredBatch { addresses, relations, chain_state: batch.chain_state })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddressRels, ScanStates};
    use alloy_primitives::{Address, U256};
    use chaingraph_types::{AddressKind, RelationId, RelationKind};
    use tempfile::TempDir;

    fn open() -> (TempDir, GraphDb) {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = GraphDb::open(&tmp_dir.path().join("graph")).expect("open db");
        (tmp_dir, db)
    }

    fn scan(n: u64) -> ScanState {
        ScanState { last_processed_key: None, is_synced: false, processed_count: n }
    }

    #[test]
    fn test_create_and_open_db() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db_path = tmp_dir.path().join("graph");
        assert!(GraphDb::open(&db_path).is_ok(), "Should create database");
        assert!(GraphDb::open(&db_path).is_ok(), "Should reopen database");
    }

    #[test]
    fn test_range_is_ordered_and_bounded() {
        let (_tmp, db) = open();
        for key in ["c", "a", "d", "b"] {
            db.put::<ScanStates>(key, &scan(1)).unwrap();
        }
        let keys: Vec<_> =
            db.range_from::<ScanStates>(None, 3).unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["a", "b", "c"]);

        let keys: Vec<_> = db
            .range_from::<ScanStates>(Some("b"), 10)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, ["b", "c", "d"]);
        assert_eq!(db.keys_from::<ScanStates>("a", 2, 5).unwrap(), ["c", "d"]);
        assert!(db.range_from::<ScanStates>(None, 0).unwrap().is_empty());
    }

    #[test]
    fn test_failed_transaction_writes_nothing() {
        let (_tmp, db) = open();
        let result: Result<(), _> = db.transaction(|batch| {
            batch.put::<ScanStates>("k", &scan(1))?;
            Err(StorageError::EntryNotFound("forced".to_string()))
        });
        assert!(result.is_err());
        assert!(!db.exists::<ScanStates>("k").unwrap());
    }

    #[test]
    fn test_batch_reads_committed_state() {
        let (_tmp, db) = open();
        db.transaction(|batch| {
            batch.put::<ScanStates>("k", &scan(1))?;
            assert!(!batch.exists::<ScanStates>("k")?);
            Ok(())
        })
        .unwrap();
        assert_eq!(db.get::<ScanStates>("k").unwrap(), Some(scan(1)));
        db.delete::<ScanStates>("k").unwrap();
        assert_eq!(db.get::<ScanStates>("k").unwrap(), None);
    }

    #[tokio::test]
    async fn test_async_transaction() {
        let (_tmp, db) = open();
        let db = Arc::new(db);
        let count = db
            .transaction_async(|batch| {
                batch.put::<ScanStates>("a", &scan(2))?;
                Ok(2)
            })
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(db.get::<ScanStates>("a").unwrap(), Some(scan(2)));
    }

    #[test]
    fn test_store_graph_batch_is_atomic_with_chain_state() {
        let (_tmp, db) = open();
        let wallet = NodeId::address(Address::repeat_byte(0xaa));
        let block = NodeId::block(7);
        let rel =
            Relation::new(RelationId::new(RelationKind::MinedBy, block, wallet.clone()), 70, None);
        let state = ChainState {
            latest_block_number: 7,
            latest_timestamp_ms: 70_000,
            latest_gas_price: U256::from(3),
        };
        let stored = db
            .store_graph_batch(IndexedBatch {
                addresses: vec![AddressRecord::new(
                    wallet.clone(),
                    AddressKind::Wallet,
                    U256::from(1),
                    70_000,
                )],
                relations: vec![rel.clone()],
                chain_state: state,
            })
            .unwrap();
        assert_eq!(stored.addresses.len(), 1);
        assert_eq!(stored.relations.len(), 1);
        assert_eq!(db.chain_state().unwrap(), Some(state));
        let key = GraphCursor::for_relation(&wallet, &rel);
        assert!(db.exists::<AddressRels>(key.as_str()).unwrap());

        // Writing the same relation again inserts nothing new.
        let stored = db
            .store_graph_batch(IndexedBatch {
                addresses: vec![],
                relations: vec![rel],
                chain_state: state,
            })
            .unwrap();
        assert!(stored.relations.is_empty());
    }
}
