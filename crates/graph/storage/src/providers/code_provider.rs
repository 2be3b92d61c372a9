//! Provider for contract code fingerprints.

use crate::{
    error::StorageError,
    models::{CodeClones, ContractCodes},
    tx::{DbRead, DbWrite},
};
use alloy_primitives::B256;
use chaingraph_types::NodeId;
use tracing::{debug, error};

/// Provides access to contract code hashes and the contracts sharing them.
#[derive(Debug)]
pub(crate) struct CodeProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> CodeProvider<'tx, TX> {
    /// Creates a new [`CodeProvider`] instance.
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

impl<TX> CodeProvider<'_, TX>
where
    TX: DbRead,
{
    pub(crate) fn code_hash(&self, id: &NodeId) -> Result<Option<B256>, StorageError> {
        self.tx.get::<ContractCodes>(&id.to_string()).inspect_err(|err| {
            error!(target: "graph_storage", %id, ?err, "Failed to read code hash");
        })
    }

    fn clones_of(&self, hash: &B256) -> Result<Vec<NodeId>, StorageError> {
        Ok(self.tx.get::<CodeClones>(&hash.to_string())?.unwrap_or_default())
    }

    pub(crate) fn contract_clones(&self, id: &NodeId) -> Result<Vec<NodeId>, StorageError> {
        let Some(hash) = self.code_hash(id)? else {
            return Ok(Vec::new());
        };
        let mut clones = self.clones_of(&hash)?;
        clones.retain(|other| other != id);
        Ok(clones)
    }
}

impl<TX> CodeProvider<'_, TX>
where
    TX: DbWrite,
{
    pub(crate) fn save_code_hash(&self, id: &NodeId, hash: B256) -> Result<(), StorageError> {
        self.tx.put::<ContractCodes>(&id.to_string(), &hash)?;
        let mut clones = self.clones_of(&hash)?;
        if !clones.contains(id) {
            clones.push(id.clone());
            self.tx.put::<CodeClones>(&hash.to_string(), &clones)?;
        }
        debug!(target: "graph_storage", %id, %hash, clones = clones.len(), "Stored code hash");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphDb;
    use alloy_primitives::Address;
    use tempfile::TempDir;

    #[test]
    fn test_clones_share_code_hash() {
        let temp_dir = TempDir::new().expect("Could not create temp dir");
        let db = GraphDb::open(temp_dir.path()).expect("Failed to open database");
        let a = NodeId::address(Address::repeat_byte(1));
        let b = NodeId::address(Address::repeat_byte(2));
        let c = NodeId::address(Address::repeat_byte(3));
        let shared = B256::repeat_byte(9);

        let provider = CodeProvider::new(&db);
        provider.save_code_hash(&a, shared).unwrap();
        provider.save_code_hash(&b, shared).unwrap();
        provider.save_code_hash(&c, B256::repeat_byte(8)).unwrap();
        provider.save_code_hash(&a, shared).unwrap();

        assert_eq!(provider.code_hash(&a).unwrap(), Some(shared));
        assert_eq!(provider.contract_clones(&a).unwrap(), vec![b.clone()]);
        assert_eq!(provider.contract_clones(&b).unwrap(), vec![a]);
        assert!(provider.contract_clones(&c).unwrap().is_empty());
        assert!(provider.contract_clones(&NodeId::block(1)).unwrap().is_empty());
    }
}
