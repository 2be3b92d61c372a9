//! Provider for relations filed under their anchor address.

use crate::{
    error::StorageError,
    models::AddressRels,
    tx::{DbRead, DbWrite},
};
use chaingraph_types::{GraphCursor, NodeId, PAGE_SIZE, Relation};
use std::collections::HashSet;
use tracing::{error, warn};

/// Provides access to address relations within a batch.
#[derive(Debug)]
pub(crate) struct RelationProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> RelationProvider<'tx, TX> {
    /// Creates a new [`RelationProvider`] instance.
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

/// Prefix shared by every key in the keyspace of `id`.
fn keyspace_prefix(id: &NodeId) -> String {
    format!("{id};")
}

impl<TX> RelationProvider<'_, TX>
where
    TX: DbRead,
{
    /// Returns up to `limit` relations after `cursor` inside its entity's keyspace.
    pub(crate) fn relations_after(
        &self,
        cursor: &GraphCursor,
        limit: usize,
    ) -> Result<Vec<Relation>, StorageError> {
        let prefix = keyspace_prefix(cursor.entity_id());
        let entries = self
            .tx
            .range_from::<AddressRels>(Some(cursor.as_str()), limit.saturating_add(1))
            .inspect_err(|err| {
                error!(target: "graph_storage", %cursor, ?err, "Failed to read relations");
            })?;
        Ok(entries
            .into_iter()
            .filter(|(key, _)| key != cursor.as_str())
            .take_while(|(key, _)| key.starts_with(&prefix))
            .take(limit)
            .map(|(_, rel)| rel)
            .collect())
    }

    /// Returns the key of every [`PAGE_SIZE`]-th relation of `id`, at most `max_cursors`.
    pub(crate) fn relation_timeline(
        &self,
        id: &NodeId,
        max_cursors: usize,
    ) -> Result<Vec<GraphCursor>, StorageError> {
        let prefix = keyspace_prefix(id);
        let mut cursors = Vec::new();
        let mut position = GraphCursor::start(id).as_str().to_string();
        let mut skip = PAGE_SIZE - 1;
        while cursors.len() < max_cursors {
            let Some(key) = self.tx.keys_from::<AddressRels>(&position, skip, 1)?.pop() else {
                break;
            };
            if !key.starts_with(&prefix) {
                break;
            }
            let cursor = GraphCursor::parse(&key).map_err(|err| {
                warn!(target: "graph_storage", %key, %err, "Stored relation key is not a cursor");
                StorageError::MalformedKey { table: "address_rels", key: key.clone() }
            })?;
            cursors.push(cursor);
            position = key;
            skip = PAGE_SIZE;
        }
        Ok(cursors)
    }
}

impl<TX> RelationProvider<'_, TX>
where
    TX: DbWrite,
{
    /// Files every relation under its anchor address, skipping relations already stored.
    ///
    /// Returns the relations that were actually inserted, keyed by their cursor.
    pub(crate) fn insert_relations(
        &self,
        relations: &[Relation],
    ) -> Result<Vec<(GraphCursor, Relation)>, StorageError> {
        let mut seen = HashSet::with_capacity(relations.len());
        let mut inserted = Vec::new();
        for rel in relations {
            let anchor = rel.id.anchor().ok_or_else(|| {
                error!(target: "graph_storage", id = %rel.id, "Relation has no address anchor");
                StorageError::UnanchoredRelation(rel.id.to_string())
            })?;
            let key = GraphCursor::for_relation(anchor, rel);
            if !seen.insert(key.clone()) || self.tx.exists::<AddressRels>(key.as_str())? {
                continue;
            }
            self.tx.put::<AddressRels>(key.as_str(), rel).inspect_err(|err| {
                error!(target: "graph_storage", %key, ?err, "Failed to store relation");
            })?;
            inserted.push((key, rel.clone()));
        }
        Ok(inserted)
    }
}
