//! Graph entities and relations.

use crate::{NodeId, RelationId};
use alloy_primitives::{Address, B64, B256, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classification of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressKind {
    /// An externally owned account.
    #[default]
    #[serde(rename = "w")]
    Wallet,
    /// A contract account.
    #[serde(rename = "c")]
    Contract,
}

/// The full form of an address entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// The address id.
    pub id: NodeId,
    /// Wallet or contract.
    pub kind: AddressKind,
    /// Balance in wei as of `last_seen_ms`.
    pub balance: U256,
    /// First time the address was seen, in milliseconds since the epoch.
    pub created_ms: u64,
    /// Last time the address was seen or refreshed, in milliseconds since the epoch.
    pub last_seen_ms: u64,
    /// Optional human readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AddressRecord {
    /// Creates a record for an address seen at `seen_ms`.
    pub const fn new(id: NodeId, kind: AddressKind, balance: U256, seen_ms: u64) -> Self {
        Self { id, kind, balance, created_ms: seen_ms, last_seen_ms: seen_ms, name: None }
    }

    /// Returns true if the address has been classified as a contract.
    pub const fn is_contract(&self) -> bool {
        matches!(self.kind, AddressKind::Contract)
    }

    /// Reconciles this incoming record with the `existing` stored one, returning a new record.
    ///
    /// Creation time is the minimum of both, last-seen and balance come from the incoming
    /// record, an existing name is never replaced, and a contract never reverts to a wallet.
    pub fn merge(&self, existing: &Self) -> Self {
        let kind = if self.is_contract() || existing.is_contract() {
            AddressKind::Contract
        } else {
            AddressKind::Wallet
        };
        Self {
            id: self.id.clone(),
            kind,
            balance: self.balance,
            created_ms: self.created_ms.min(existing.created_ms),
            last_seen_ms: self.last_seen_ms,
            name: existing.name.clone().or_else(|| self.name.clone()),
        }
    }

    /// Returns true if the record is older than `threshold` at `now_ms`.
    pub fn is_stale(&self, now_ms: u64, threshold: Duration) -> bool {
        now_ms.saturating_sub(self.last_seen_ms) > threshold.as_millis() as u64
    }
}

/// The full form of a block entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// The block id.
    pub id: NodeId,
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Parent block hash.
    pub parent_hash: B256,
    /// Beneficiary of the block.
    pub miner: Address,
    /// Block timestamp in seconds.
    pub timestamp: u64,
    /// Proof of work nonce.
    pub nonce: B64,
    /// Proof of work difficulty.
    pub difficulty: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Gas used.
    pub gas_used: u64,
    /// Extra data set by the miner.
    pub extra_data: Bytes,
}

/// The full form of a transaction entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// The transaction id.
    pub id: NodeId,
    /// Transaction hash.
    pub hash: B256,
    /// Number of the including block.
    pub block_number: u64,
    /// Sender.
    pub from: Address,
    /// Recipient, or the deployed contract for contract creations.
    pub to: Option<Address>,
    /// True if the transaction deployed a contract.
    pub contract_creation: bool,
    /// Value transferred in wei.
    pub value: U256,
    /// Sender nonce.
    pub nonce: u64,
    /// Gas limit.
    pub gas_limit: u64,
    /// Gas used, from the receipt.
    pub gas_used: u64,
    /// Effective gas price, from the receipt.
    pub gas_price: u128,
    /// Receipt status.
    pub status: bool,
}

/// A directed, typed edge between two entities.
///
/// Relations are immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Deterministic relation identity.
    pub id: RelationId,
    /// Block timestamp in seconds.
    pub ts: u64,
    /// Value transferred, for value carrying relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
}

impl Relation {
    /// Creates a new relation.
    pub const fn new(id: RelationId, ts: u64, value: Option<U256>) -> Self {
        Self { id, ts, value }
    }
}

/// Anything a fetcher can return in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GraphObject {
    /// A full address.
    Address(AddressRecord),
    /// A full block.
    Block(BlockRecord),
    /// A full transaction.
    Transaction(TransactionRecord),
    /// The reference form of an entity, known only by id.
    Reference(NodeId),
    /// A relation.
    Relation(Relation),
}

impl GraphObject {
    /// Returns the entity id for nodes, `None` for relations.
    pub const fn node_id(&self) -> Option<&NodeId> {
        match self {
            Self::Address(a) => Some(&a.id),
            Self::Block(b) => Some(&b.id),
            Self::Transaction(t) => Some(&t.id),
            Self::Reference(id) => Some(id),
            Self::Relation(_) => None,
        }
    }

    /// Returns the relation, if this is one.
    pub const fn as_relation(&self) -> Option<&Relation> {
        match self {
            Self::Relation(rel) => Some(rel),
            _ => None,
        }
    }

    /// Returns true for relations.
    pub const fn is_relation(&self) -> bool {
        matches!(self, Self::Relation(_))
    }
}

impl From<Relation> for GraphObject {
    fn from(rel: Relation) -> Self {
        Self::Relation(rel)
    }
}

impl From<AddressRecord> for GraphObject {
    fn from(addr: AddressRecord) -> Self {
        Self::Address(addr)
    }
}
