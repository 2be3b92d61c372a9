//! Domain events published by the indexer.
//!
//! Each event type has its own bounded broadcast channel, so a subscriber only receives the
//! events it asked for. A subscriber that falls behind by more than the channel capacity skips
//! the oldest events and observes [`broadcast::error::RecvError::Lagged`].

use chaingraph_types::{AddressRecord, ChainState, GraphCursor, Relation};
use tokio::sync::broadcast;

/// An address record was merged into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressUpserted {
    /// The record as stored.
    pub address: AddressRecord,
}

/// A relation that was not stored before has been inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationCreated {
    /// The storage key of the relation.
    pub cursor: GraphCursor,
    /// The relation.
    pub relation: Relation,
    /// The anchor address as stored with the same batch, if it was part of it.
    pub address: Option<AddressRecord>,
}

/// The indexer watermark advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStateChanged {
    /// The new watermark.
    pub state: ChainState,
}

/// Fan-out registry of the indexer's domain events.
#[derive(Debug, Clone)]
pub struct EventBus {
    addresses: broadcast::Sender<AddressUpserted>,
    relations: broadcast::Sender<RelationCreated>,
    chain_state: broadcast::Sender<ChainStateChanged>,
}

impl EventBus {
    /// Default capacity of every channel.
    pub const DEFAULT_CAPACITY: usize = 4_096;

    /// Creates a bus whose channels each buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (addresses, _) = broadcast::channel(capacity);
        let (relations, _) = broadcast::channel(capacity);
        let (chain_state, _) = broadcast::channel(capacity);
        Self { addresses, relations, chain_state }
    }

    /// Subscribes to address upserts.
    pub fn subscribe_addresses(&self) -> broadcast::Receiver<AddressUpserted> {
        self.addresses.subscribe()
    }

    /// Subscribes to relation inserts.
    pub fn subscribe_relations(&self) -> broadcast::Receiver<RelationCreated> {
        self.relations.subscribe()
    }

    /// Subscribes to watermark changes.
    pub fn subscribe_chain_state(&self) -> broadcast::Receiver<ChainStateChanged> {
        self.chain_state.subscribe()
    }

    /// Publishes an address upsert. Returns the number of subscribers reached.
    pub fn publish_address(&self, event: AddressUpserted) -> usize {
        self.addresses.send(event).unwrap_or_default()
    }

    /// Publishes a relation insert. Returns the number of subscribers reached.
    pub fn publish_relation(&self, event: RelationCreated) -> usize {
        self.relations.send(event).unwrap_or_default()
    }

    /// Publishes a watermark change. Returns the number of subscribers reached.
    pub fn publish_chain_state(&self, event: ChainStateChanged) -> usize {
        self.chain_state.send(event).unwrap_or_default()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
