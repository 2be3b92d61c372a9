//! Responses of the chain queries.

use alloy_primitives::{Address, B256, U64, U256};
use chaingraph_types::{AddressKind, BlockRecord, TransactionRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response of `erigon_getBlockNode`: a range of blocks and the balances of every address they
/// touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockNodes {
    /// The blocks in ascending order.
    #[serde(default)]
    pub blocks: Vec<BlockNode>,
    /// Balances keyed by lowercase `0x` address.
    #[serde(default)]
    pub balances: HashMap<String, U256>,
}

/// One block of a [`BlockNodes`] response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockNode {
    /// The block.
    #[serde(rename = "fullblock")]
    pub block: RawBlock,
}

/// The block fields the indexer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    /// Beneficiary.
    pub miner: Address,
    /// Block number.
    pub number: U64,
    /// Block timestamp in seconds.
    pub timestamp: U64,
    /// Transactions in block order.
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
}

/// The transaction fields the indexer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Sender.
    pub from: Address,
    /// Transaction hash.
    pub hash: B256,
    /// Recipient, or the deployed contract when `kind` is a contract.
    #[serde(default)]
    pub to: Option<Address>,
    /// Kind of the recipient.
    #[serde(rename = "t")]
    pub kind: AddressKind,
    /// Value transferred in wei.
    pub value: U256,
}

/// A block with the hashes of its transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBlock {
    /// The block.
    pub block: BlockRecord,
    /// Transaction hashes in block order.
    pub transactions: Vec<B256>,
}

/// A transaction with the timestamp of its block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
    /// The transaction, including receipt data.
    pub record: TransactionRecord,
    /// Timestamp of the including block in seconds.
    pub timestamp: u64,
}
