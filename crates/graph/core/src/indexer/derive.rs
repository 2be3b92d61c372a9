//! Derivation of graph records from block batches.

use crate::chain::{BlockNodes, RawBlock};
use alloy_primitives::{Address, U256};
use chaingraph_types::{AddressKind, AddressRecord, NodeId, Relation, RelationId, RelationKind};
use std::collections::HashMap;
use tracing::warn;

/// Graph records derived from one batch of blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedBatch {
    /// Address snapshots, one per address, in order of first appearance.
    pub addresses: Vec<AddressRecord>,
    /// Mined-by, send, receive and contract-created relations.
    pub relations: Vec<Relation>,
    /// Timestamp of the last block of the batch in seconds.
    pub last_timestamp: u64,
}

/// Derives the address and relation records of a batch.
///
/// Returns `None` when the balance map is empty: the node has not processed the range yet and
/// the batch should be retried later.
pub fn derive_batch(nodes: &BlockNodes) -> Option<DerivedBatch> {
    if nodes.balances.is_empty() {
        return None;
    }
    let balances: HashMap<Address, U256> = nodes
        .balances
        .iter()
        .filter_map(|(key, balance)| match key.parse::<Address>() {
            Ok(address) => Some((address, *balance)),
            Err(err) => {
                warn!(target: "indexer", key, %err, "Skipping malformed balance key");
                None
            }
        })
        .collect();

    let mut derived =
        Derivation { balances, batch: DerivedBatch::default(), positions: HashMap::new() };
    for node in &nodes.blocks {
        derived.add_block(&node.block);
    }
    Some(derived.batch)
}

struct Derivation {
    balances: HashMap<Address, U256>,
    batch: DerivedBatch,
    positions: HashMap<NodeId, usize>,
}

impl Derivation {
    fn add_block(&mut self, block: &RawBlock) {
        let number = block.number.to::<u64>();
        let ts = block.timestamp.to::<u64>();
        let seen_ms = ts.saturating_mul(1000);
        let block_id = NodeId::block(number);
        self.batch.last_timestamp = ts;

        let miner = self.add_address(block.miner, AddressKind::Wallet, seen_ms);
        self.add_relation(RelationKind::MinedBy, block_id, miner, ts, None);

        for tx in &block.transactions {
            let tx_id = NodeId::transaction(tx.hash);
            let from = self.add_address(tx.from, AddressKind::Wallet, seen_ms);
            self.add_relation(RelationKind::Send, from, tx_id.clone(), ts, Some(tx.value));

            let Some(to) = tx.to else {
                warn!(
                    target: "indexer",
                    tx = %tx.hash,
                    block = number,
                    "Transaction without recipient"
                );
                continue;
            };
            let recipient = self.add_address(to, tx.kind, seen_ms);
            let kind = match tx.kind {
                AddressKind::Wallet => RelationKind::Receive,
                AddressKind::Contract => RelationKind::ContractCreated,
            };
            self.add_relation(kind, tx_id, recipient, ts, Some(tx.value));
        }
    }

    fn add_address(&mut self, address: Address, kind: AddressKind, seen_ms: u64) -> NodeId {
        let id = NodeId::address(address);
        let balance = self.balances.get(&address).copied().unwrap_or_else(|| {
            warn!(target: "indexer", %address, "No balance reported for address");
            U256::ZERO
        });
        let incoming = AddressRecord::new(id.clone(), kind, balance, seen_ms);
        match self.positions.get(&id) {
            Some(&position) => {
                let existing = &self.batch.addresses[position];
                self.batch.addresses[position] = incoming.merge(existing);
            }
            None => {
                self.positions.insert(id.clone(), self.batch.addresses.len());
                self.batch.addresses.push(incoming);
            }
        }
        id
    }

    fn add_relation(
        &mut self,
        kind: RelationKind,
        source: NodeId,
        dest: NodeId,
        ts: u64,
        value: Option<U256>,
    ) {
        self.batch.relations.push(Relation::new(RelationId::new(kind, source, dest), ts, value));
    }
}
