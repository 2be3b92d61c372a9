//! Provider for address records.

use crate::{
    error::StorageError,
    models::Addresses,
    tx::{DbRead, DbWrite},
};
use chaingraph_types::{AddressRecord, NodeId};
use std::collections::HashMap;
use tracing::{error, trace};

/// Provides access to address records within a batch.
#[derive(Debug)]
pub(crate) struct AddressProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> AddressProvider<'tx, TX> {
    /// Creates a new [`AddressProvider`] instance.
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

impl<TX> AddressProvider<'_, TX>
where
    TX: DbRead,
{
    /// Gets the stored [`AddressRecord`] for `id`.
    pub(crate) fn get_address(&self, id: &NodeId) -> Result<Option<AddressRecord>, StorageError> {
        self.tx.get::<Addresses>(&id.to_string()).inspect_err(|err| {
            error!(target: "graph_storage", %id, ?err, "Failed to get address");
        })
    }
}

impl<TX> AddressProvider<'_, TX>
where
    TX: DbWrite,
{
    /// Merges `incoming` with the stored record and writes the result.
    pub(crate) fn upsert_address(
        &self,
        incoming: &AddressRecord,
    ) -> Result<AddressRecord, StorageError> {
        let merged = match self.get_address(&incoming.id)? {
            Some(existing) => incoming.merge(&existing),
            None => incoming.clone(),
        };
        self.tx.put::<Addresses>(&merged.id.to_string(), &merged).inspect_err(|err| {
            error!(target: "graph_storage", id = %merged.id, ?err, "Failed to store address");
        })?;
        trace!(target: "graph_storage", id = %merged.id, "Upserted address");
        Ok(merged)
    }

    /// Upserts every record of `incoming`.
    ///
    /// Reads observe committed state only, so repeated ids are merged in memory first, in
    /// input order.
    pub(crate) fn upsert_addresses(
        &self,
        incoming: &[AddressRecord],
    ) -> Result<Vec<AddressRecord>, StorageError> {
        let mut collapsed: Vec<AddressRecord> = Vec::with_capacity(incoming.len());
        let mut positions: HashMap<&NodeId, usize> = HashMap::with_capacity(incoming.len());
        for record in incoming {
            match positions.get(&record.id) {
                Some(&pos) => collapsed[pos] = record.merge(&collapsed[pos]),
                None => {
                    positions.insert(&record.id, collapsed.len());
                    collapsed.push(record.clone());
                }
            }
        }
        collapsed.iter().map(|record| self.upsert_address(record)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphDb;
    use alloy_primitives::{Address, U256};
    use chaingraph_types::AddressKind;
    use tempfile::TempDir;

    fn setup_db() -> (TempDir, GraphDb) {
        let temp_dir = TempDir::new().expect("Could not create temp dir");
        let db = GraphDb::open(temp_dir.path()).expect("Failed to open database");
        (temp_dir, db)
    }

    fn record(kind: AddressKind, balance: u64, seen_ms: u64) -> AddressRecord {
        let id = NodeId::address(Address::repeat_byte(1));
        AddressRecord::new(id, kind, U256::from(balance), seen_ms)
    }

    #[test]
    fn test_upsert_merges_with_stored_record() {
        let (_tmp, db) = setup_db();
        let first = record(AddressKind::Contract, 5, 2_000);
        db.transaction(|tx| AddressProvider::new(tx).upsert_address(&first)).unwrap();

        let later = record(AddressKind::Wallet, 9, 3_000);
        let merged =
            db.transaction(|tx| AddressProvider::new(tx).upsert_address(&later)).unwrap();

        assert_eq!(merged.created_ms, 2_000);
        assert_eq!(merged.last_seen_ms, 3_000);
        assert_eq!(merged.balance, U256::from(9));
        assert!(merged.is_contract());

        let stored = AddressProvider::new(&db).get_address(&first.id).unwrap();
        assert_eq!(stored, Some(merged));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (_tmp, db) = setup_db();
        let incoming = record(AddressKind::Wallet, 1, 1_000);
        let once =
            db.transaction(|tx| AddressProvider::new(tx).upsert_address(&incoming)).unwrap();
        let twice =
            db.transaction(|tx| AddressProvider::new(tx).upsert_address(&incoming)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_upsert_many_collapses_duplicates() {
        let (_tmp, db) = setup_db();
        let batch =
            [record(AddressKind::Wallet, 1, 5_000), record(AddressKind::Wallet, 2, 6_000)];
        let stored =
            db.transaction(|tx| AddressProvider::new(tx).upsert_addresses(&batch)).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].created_ms, 5_000);
        assert_eq!(stored[0].last_seen_ms, 6_000);
        assert_eq!(stored[0].balance, U256::from(2));
    }

    #[test]
    fn test_missing_address() {
        let (_tmp, db) = setup_db();
        let id = NodeId::address(Address::ZERO);
        assert_eq!(AddressProvider::new(&db).get_address(&id).unwrap(), None);
    }
}
