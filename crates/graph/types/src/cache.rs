//! Values stored by graph caches.

use crate::{AddressRecord, BlockRecord, GraphObject, Relation, TransactionRecord};
use serde::{Deserialize, Serialize};

/// A cached entity snapshot or relation page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheValue {
    /// An address snapshot, keyed by address id.
    Address {
        /// The snapshot.
        node: AddressRecord,
    },
    /// A block and everything fetched alongside it, keyed by block id.
    Block {
        /// The block.
        node: BlockRecord,
        /// Incident relations, references and the miner.
        rels: Vec<GraphObject>,
    },
    /// A transaction and its incident relations, keyed by transaction id.
    Transaction {
        /// The transaction.
        node: TransactionRecord,
        /// Incident relations.
        rels: Vec<GraphObject>,
    },
    /// One page of an address's relations, keyed by the cursor the page starts after.
    RelationPage {
        /// The relations.
        rels: Vec<Relation>,
    },
}

impl CacheValue {
    /// Returns true if a cached block or transaction carries at least one relation.
    pub fn has_relations(&self) -> bool {
        match self {
            Self::Block { rels, .. } | Self::Transaction { rels, .. } => {
                rels.iter().any(GraphObject::is_relation)
            }
            Self::RelationPage { rels } => !rels.is_empty(),
            Self::Address { .. } => false,
        }
    }

    /// Expands a cached block or transaction back into a fetch batch.
    pub fn into_objects(self) -> Vec<GraphObject> {
        match self {
            Self::Address { node } => vec![GraphObject::Address(node)],
            Self::Block { node, rels } => {
                std::iter::once(GraphObject::Block(node)).chain(rels).collect()
            }
            Self::Transaction { node, rels } => {
                std::iter::once(GraphObject::Transaction(node)).chain(rels).collect()
            }
            Self::RelationPage { rels } => rels.into_iter().map(GraphObject::Relation).collect(),
        }
    }
}
