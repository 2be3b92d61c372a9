//! Provider for reverse resolved ENS names.

use crate::{
    error::StorageError,
    models::{Addresses, EnsNames},
    providers::AddressProvider,
    tx::{DbRead, DbWrite},
};
use chaingraph_types::{AddressRecord, NodeId};
use tracing::{debug, error};

/// Provides access to ENS names and the addresses they resolve for.
#[derive(Debug)]
pub(crate) struct NameProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> NameProvider<'tx, TX> {
    /// Creates a new [`NameProvider`] instance.
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

impl<TX> NameProvider<'_, TX>
where
    TX: DbRead,
{
    pub(crate) fn name_owner(&self, name: &str) -> Result<Option<NodeId>, StorageError> {
        self.tx.get::<EnsNames>(name).inspect_err(|err| {
            error!(target: "graph_storage", name, ?err, "Failed to read name owner");
        })
    }
}

impl<TX> NameProvider<'_, TX>
where
    TX: DbWrite,
{
    /// Sets `name` on the freshest stored record of `id`, keeping a name it already has.
    pub(crate) fn save_name(
        &self,
        id: &NodeId,
        name: &str,
    ) -> Result<Option<AddressRecord>, StorageError> {
        self.tx.put::<EnsNames>(name, id)?;
        let Some(mut address) = AddressProvider::new(self.tx).get_address(id)? else {
            debug!(target: "graph_storage", %id, name, "Name resolved for unknown address");
            return Ok(None);
        };
        if address.name.is_none() {
            address.name = Some(name.to_string());
            self.tx.put::<Addresses>(&id.to_string(), &address)?;
        }
        debug!(target: "graph_storage", %id, name, "Stored name");
        Ok(Some(address))
    }
}
