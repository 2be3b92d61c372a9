//! Entity and relation identifiers.

use crate::radix;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Errors returned when parsing an entity or relation id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The id is missing its `<type>,` prefix.
    #[error("missing type prefix in {0:?}")]
    MissingPrefix(String),
    /// The type prefix is not one of the known entity or relation kinds.
    #[error("unknown type prefix {0:?}")]
    UnknownKind(String),
    /// The opaque part of the id is not a valid radix-252 value.
    #[error("invalid id value: {0}")]
    InvalidValue(#[from] radix::RadixError),
    /// A relation id is missing its `source-dest` separator.
    #[error("missing endpoint separator in {0:?}")]
    MissingEndpoints(String),
}

/// The type of a graph entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    /// An externally owned account or a contract.
    Address,
    /// A block.
    Block,
    /// A transaction.
    Transaction,
}

impl NodeKind {
    /// The id prefix for this kind.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Address => "a",
            Self::Block => "b",
            Self::Transaction => "t",
        }
    }

    /// Parses an id prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "a" => Some(Self::Address),
            "b" => Some(Self::Block),
            "t" => Some(Self::Transaction),
            _ => None,
        }
    }
}

/// Identity of a graph entity: its kind plus a radix-252 encoded value.
///
/// Renders as `"<kind>,<radix>"`, e.g. `a,<radix of the 160 bit address>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    kind: NodeKind,
    value: String,
}

impl NodeId {
    /// Id of an address.
    pub fn address(address: Address) -> Self {
        let value = radix::encode(U256::from_be_slice(address.as_slice()));
        Self { kind: NodeKind::Address, value }
    }

    /// Id of a block.
    pub fn block(number: u64) -> Self {
        Self { kind: NodeKind::Block, value: radix::encode_u64(number) }
    }

    /// Id of a transaction.
    pub fn transaction(hash: B256) -> Self {
        Self { kind: NodeKind::Transaction, value: radix::encode(U256::from_be_bytes(hash.0)) }
    }

    /// The kind of entity this id refers to.
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The radix-252 encoded value.
    pub fn radix(&self) -> &str {
        &self.value
    }

    /// Returns true if this id refers to an address.
    pub const fn is_address(&self) -> bool {
        matches!(self.kind, NodeKind::Address)
    }

    /// Decodes the address, if this is an address id.
    pub fn as_address(&self) -> Option<Address> {
        if !self.is_address() {
            return None;
        }
        let value = radix::decode(&self.value).ok()?;
        if value.bit_len() > 160 {
            return None;
        }
        Some(Address::from_word(B256::from(value.to_be_bytes::<32>())))
    }

    /// Decodes the block number, if this is a block id.
    pub fn block_number(&self) -> Option<u64> {
        match self.kind {
            NodeKind::Block => radix::decode_u64(&self.value).ok(),
            _ => None,
        }
    }

    /// Decodes the transaction hash, if this is a transaction id.
    pub fn transaction_hash(&self) -> Option<B256> {
        match self.kind {
            NodeKind::Transaction => {
                radix::decode(&self.value).ok().map(|v| B256::from(v.to_be_bytes::<32>()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.kind.prefix(), self.value)
    }
}

impl FromStr for NodeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, value) = s.split_once(',').ok_or_else(|| IdError::MissingPrefix(s.into()))?;
        let kind =
            NodeKind::from_prefix(prefix).ok_or_else(|| IdError::UnknownKind(prefix.into()))?;
        radix::decode(value)?;
        Ok(Self { kind, value: value.to_string() })
    }
}

impl TryFrom<String> for NodeId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

/// The type of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationKind {
    /// Transaction -> the contract it deployed.
    ContractCreated,
    /// Transaction -> recipient address.
    Receive,
    /// Sender address -> transaction.
    Send,
    /// Block -> transaction included in it.
    ChildTransaction,
    /// Parent block -> child block.
    ParentBlock,
    /// Block -> miner address.
    MinedBy,
}

impl RelationKind {
    /// The short code used inside relation ids.
    pub const fn code(self) -> &'static str {
        match self {
            Self::ContractCreated => "c",
            Self::Receive => "r",
            Self::Send => "tx",
            Self::ChildTransaction => "tp",
            Self::ParentBlock => "pb",
            Self::MinedBy => "m",
        }
    }

    /// Parses a relation code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(Self::ContractCreated),
            "r" => Some(Self::Receive),
            "tx" => Some(Self::Send),
            "tp" => Some(Self::ChildTransaction),
            "pb" => Some(Self::ParentBlock),
            "m" => Some(Self::MinedBy),
            _ => None,
        }
    }
}

/// Deterministic relation identity, rendered as `"<kind>,<source>-<dest>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelationId {
    /// The relation type.
    pub kind: RelationKind,
    /// The source endpoint.
    pub source: NodeId,
    /// The destination endpoint.
    pub dest: NodeId,
}

impl RelationId {
    /// Creates a new relation id.
    pub const fn new(kind: RelationKind, source: NodeId, dest: NodeId) -> Self {
        Self { kind, source, dest }
    }

    /// The address this relation is filed under.
    ///
    /// Relations are paginated per address, so the anchor is always the address endpoint:
    /// the sender for sends, the recipient for receives and contract creations, and the miner
    /// for mined-by links. Block-to-block and block-to-transaction links have no anchor.
    pub const fn anchor(&self) -> Option<&NodeId> {
        match self.kind {
            RelationKind::Send => Some(&self.source),
            RelationKind::Receive | RelationKind::ContractCreated | RelationKind::MinedBy => {
                Some(&self.dest)
            }
            RelationKind::ChildTransaction | RelationKind::ParentBlock => None,
        }
    }

    /// The relation id with the given entity id removed, the input to the cursor hash.
    pub fn without(&self, id: &NodeId) -> String {
        self.to_string().replacen(&id.to_string(), "", 1)
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}-{}", self.kind.code(), self.source, self.dest)
    }
}

impl FromStr for RelationId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, rest) = s.split_once(',').ok_or_else(|| IdError::MissingPrefix(s.into()))?;
        let kind = RelationKind::from_code(code).ok_or_else(|| IdError::UnknownKind(code.into()))?;
        let (source, dest) =
            rest.split_once('-').ok_or_else(|| IdError::MissingEndpoints(s.into()))?;
        Ok(Self { kind, source: source.parse()?, dest: dest.parse()? })
    }
}

impl TryFrom<String> for RelationId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RelationId> for String {
    fn from(id: RelationId) -> Self {
        id.to_string()
    }
}
