use crate::chain::{ChainReader, ChainReaderError};
use async_trait::async_trait;
use chaingraph_storage::{
    AddressStorage, ChainStateStorage, GraphDb, RelationStorage, StorageError,
};
use chaingraph_types::{
    ChainState, FetchStep, FetchStream, GraphCursor, GraphFetcher, GraphObject, NodeError, NodeId,
    PAGE_SIZE, Relation, RelationId, RelationKind,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on the cursors of one timeline.
const MAX_TIMELINE_CURSORS: usize = 1_000;

/// Cursors per timeline batch.
const TIMELINE_BATCH: usize = 10;

fn storage_failure(err: &StorageError) -> NodeError {
    warn!(target: "graph_fetcher", ?err, "Graph storage read failed");
    NodeError::network(
        "The graph is temporarily unavailable, please try again shortly",
        err.to_string(),
    )
}

fn chain_failure(what: String, err: &ChainReaderError) -> NodeError {
    warn!(target: "graph_fetcher", %err, what, "Chain query failed");
    NodeError::network(format!("Couldn't load {what}, please try again shortly"), err.to_string())
}

fn relation(kind: RelationKind, source: NodeId, dest: NodeId, ts: u64) -> GraphObject {
    GraphObject::Relation(Relation::new(RelationId::new(kind, source, dest), ts, None))
}

/// [`GraphFetcher`] serving addresses and relations from the local graph and blocks and
/// transactions from the chain node.
#[derive(Debug)]
pub struct LocalFetcher<R> {
    db: Arc<GraphDb>,
    reader: Arc<R>,
}

impl<R> Clone for LocalFetcher<R> {
    fn clone(&self) -> Self {
        Self { db: Arc::clone(&self.db), reader: Arc::clone(&self.reader) }
    }
}

impl<R> LocalFetcher<R>
where
    R: ChainReader + 'static,
{
    /// Creates a new [`LocalFetcher`].
    pub const fn new(db: Arc<GraphDb>, reader: Arc<R>) -> Self {
        Self { db, reader }
    }

    fn chain_state(&self) -> Result<ChainState, NodeError> {
        self.db.chain_state().map(Option::unwrap_or_default).map_err(|err| storage_failure(&err))
    }
}

#[async_trait]
impl<R> GraphFetcher for LocalFetcher<R>
where
    R: ChainReader + 'static,
{
    fn fetch_address_timeline(&self, id: NodeId) -> FetchStream<GraphCursor> {
        let db = Arc::clone(&self.db);
        FetchStream::new(async_stream::stream! {
            let cursors = match db.relation_timeline(&id, MAX_TIMELINE_CURSORS) {
                Ok(cursors) => cursors,
                Err(err) => {
                    let err = storage_failure(&err);
                    yield FetchStep::Done(Some(err));
                    return;
                }
            };
            debug!(target: "graph_fetcher", %id, cursors = cursors.len(), "Loaded timeline");
            if cursors.is_empty() {
                match db.get_address(&id) {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        yield FetchStep::Done(Some(NodeError::not_exists(
                            "Address not found",
                            format!("address {id} is not indexed"),
                        )));
                        return;
                    }
                    Err(err) => {
                        let err = storage_failure(&err);
                        yield FetchStep::Done(Some(err));
                        return;
                    }
                }
            }
            for chunk in cursors.chunks(TIMELINE_BATCH) {
                yield FetchStep::Yielded(chunk.to_vec());
            }
        })
    }

    fn fetch_address_rels(
        &self,
        cursor: GraphCursor,
        include_address: bool,
    ) -> FetchStream<GraphObject> {
        let db = Arc::clone(&self.db);
        FetchStream::new(async_stream::stream! {
            let id = cursor.entity_id().clone();
            let address = match db.get_address(&id) {
                Ok(Some(address)) => address,
                Ok(None) => {
                    yield FetchStep::Done(Some(NodeError::not_exists(
                        "Address not found",
                        format!("cursor {cursor} refers to an unknown address"),
                    )));
                    return;
                }
                Err(err) => {
                    let err = storage_failure(&err);
                    yield FetchStep::Done(Some(err));
                    return;
                }
            };
            if include_address {
                yield FetchStep::Yielded(vec![GraphObject::Address(address)]);
            }
            match db.relations_after(&cursor, PAGE_SIZE) {
                Ok(page) if page.is_empty() => {}
                Ok(page) => {
                    let page = page.into_iter().map(GraphObject::Relation).collect();
                    yield FetchStep::Yielded(page);
                }
                Err(err) => {
                    let err = storage_failure(&err);
                    yield FetchStep::Done(Some(err));
                }
            }
        })
    }

    fn fetch_block(&self, id: NodeId) -> FetchStream<GraphObject> {
        let Some(number) = id.block_number() else {
            return FetchStream::failed(NodeError::not_exists(
                "Block not found",
                format!("{id} is not a block id"),
            ));
        };
        let head = match self.chain_state() {
            Ok(state) => state.latest_block_number,
            Err(err) => return FetchStream::failed(err),
        };
        if number > head {
            return FetchStream::failed(NodeError::not_exists(
                format!("Block {number} exceeds latest block #{head}"),
                "block number too big",
            ));
        }
        let db = Arc::clone(&self.db);
        let reader = Arc::clone(&self.reader);
        FetchStream::new(async_stream::stream! {
            let chain_block = match reader.block_with_transactions(number).await {
                Ok(Some(chain_block)) => chain_block,
                Ok(None) => {
                    yield FetchStep::Done(Some(NodeError::not_exists(
                        format!("Block number {number} does not exist"),
                        format!("block {number} not found"),
                    )));
                    return;
                }
                Err(err) => {
                    let err = chain_failure(format!("block {number}"), &err);
                    yield FetchStep::Done(Some(err));
                    return;
                }
            };
            let block = chain_block.block;
            let ts = block.timestamp;

            if number > 0 {
                let parent = NodeId::block(number - 1);
                let link = relation(RelationKind::ParentBlock, parent, id.clone(), ts);
                yield FetchStep::Yielded(vec![link]);
            }
            if number < head {
                let child = NodeId::block(number + 1);
                let link = relation(RelationKind::ParentBlock, id.clone(), child, ts);
                yield FetchStep::Yielded(vec![link]);
            }

            let miner_id = NodeId::address(block.miner);
            let miner = match db.get_address(&miner_id) {
                Ok(Some(miner)) => GraphObject::Address(miner),
                Ok(None) => GraphObject::Reference(miner_id.clone()),
                Err(err) => {
                    let err = storage_failure(&err);
                    yield FetchStep::Done(Some(err));
                    return;
                }
            };
            let mined_by = relation(RelationKind::MinedBy, id.clone(), miner_id, ts);
            yield FetchStep::Yielded(vec![GraphObject::Block(block), miner, mined_by]);

            let mut transactions = Vec::with_capacity(chain_block.transactions.len() * 2);
            for hash in chain_block.transactions {
                let tx_id = NodeId::transaction(hash);
                transactions.push(GraphObject::Reference(tx_id.clone()));
                transactions.push(relation(RelationKind::ChildTransaction, id.clone(), tx_id, ts));
            }
            if !transactions.is_empty() {
                yield FetchStep::Yielded(transactions);
            }
        })
    }

    fn fetch_transaction(&self, id: NodeId) -> FetchStream<GraphObject> {
        let Some(hash) = id.transaction_hash() else {
            return FetchStream::failed(NodeError::not_exists(
                "Transaction not found",
                format!("{id} is not a transaction id"),
            ));
        };
        let reader = Arc::clone(&self.reader);
        FetchStream::new(async_stream::stream! {
            let chain_tx = match reader.transaction(hash).await {
                Ok(Some(chain_tx)) => chain_tx,
                Ok(None) => {
                    yield FetchStep::Done(Some(NodeError::not_exists(
                        format!("Transaction with hash {hash} does not exist"),
                        format!("tx {hash} not found"),
                    )));
                    return;
                }
                Err(err) => {
                    let err = chain_failure(format!("transaction {hash}"), &err);
                    yield FetchStep::Done(Some(err));
                    return;
                }
            };
            let record = chain_tx.record;
            let ts = chain_tx.timestamp;
            let value = Some(record.value);
            let block_id = NodeId::block(record.block_number);

            let transfer = |kind, source, dest| {
                GraphObject::Relation(Relation::new(RelationId::new(kind, source, dest), ts, value))
            };

            let mut objects = vec![
                relation(RelationKind::ChildTransaction, block_id, id.clone(), ts),
                transfer(RelationKind::Send, NodeId::address(record.from), id.clone()),
            ];
            if let Some(to) = record.to {
                let recipient = NodeId::address(to);
                objects.push(transfer(RelationKind::Receive, id.clone(), recipient.clone()));
                if record.contract_creation {
                    objects.push(transfer(RelationKind::ContractCreated, id.clone(), recipient));
                }
            }
            objects.insert(0, GraphObject::Transaction(record));
            yield FetchStep::Yielded(objects);
        })
    }

    async fn request_server_push(&self) -> Result<ChainState, NodeError> {
        self.chain_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainBlock, ChainTransaction, MockChainReader};
    use alloy_primitives::{Address, B64, B256, Bytes, U256};
    use chaingraph_storage::{GraphStorageWriter, IndexedBatch};
    use chaingraph_types::{AddressKind, AddressRecord, NodeErrorKind, TransactionRecord};
    use tempfile::TempDir;

    const MINER: Address = Address::repeat_byte(0xee);
    const ALICE: Address = Address::repeat_byte(0xaa);
    const BOB: Address = Address::repeat_byte(0xbb);

    fn open_db() -> (TempDir, Arc<GraphDb>) {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = GraphDb::open(&tmp_dir.path().join("graph")).expect("open db");
        (tmp_dir, Arc::new(db))
    }

    fn send(n: u64) -> Relation {
        let tx = NodeId::transaction(B256::left_padding_from(&n.to_be_bytes()));
        let id = RelationId::new(RelationKind::Send, NodeId::address(ALICE), tx);
        Relation::new(id, 1_000 + n, None)
    }

    /// Stores Alice with `sends` sends and sets the chain head to `head`.
    fn seed(db: &GraphDb, sends: u64, head: u64) {
        let alice =
            AddressRecord::new(NodeId::address(ALICE), AddressKind::Wallet, U256::from(5), 1);
        db.store_graph_batch(IndexedBatch {
            addresses: vec![alice],
            relations: (0..sends).map(send).collect(),
            chain_state: ChainState { latest_block_number: head, ..Default::default() },
        })
        .unwrap();
    }

    fn fetcher(db: Arc<GraphDb>, reader: MockChainReader) -> LocalFetcher<MockChainReader> {
        LocalFetcher::new(db, Arc::new(reader))
    }

    fn chain_block(number: u64, transactions: Vec<B256>) -> ChainBlock {
        ChainBlock {
            block: chaingraph_types::BlockRecord {
                id: NodeId::block(number),
                number,
                hash: B256::repeat_byte(1),
                parent_hash: B256::repeat_byte(2),
                miner: MINER,
                timestamp: 1_700,
                nonce: B64::ZERO,
                difficulty: U256::ZERO,
                gas_limit: 30_000_000,
                gas_used: 21_000,
                extra_data: Bytes::new(),
            },
            transactions,
        }
    }

    fn relation_kinds(objects: &[GraphObject]) -> Vec<RelationKind> {
        objects.iter().filter_map(GraphObject::as_relation).map(|rel| rel.id.kind).collect()
    }

    #[tokio::test]
    async fn test_timeline_yields_page_boundaries() {
        let (_tmp, db) = open_db();
        seed(&db, 2 * PAGE_SIZE as u64 + 3, 10);
        let local = fetcher(db, MockChainReader::new());

        let (cursors, err) =
            local.fetch_address_timeline(NodeId::address(ALICE)).collect_all().await;
        assert_eq!(err, None);
        assert_eq!(cursors.len(), 2);
        assert!(cursors[0] < cursors[1]);
    }

    #[tokio::test]
    async fn test_timeline_of_unknown_address() {
        let (_tmp, db) = open_db();
        let local = fetcher(db, MockChainReader::new());
        let (cursors, err) = local.fetch_address_timeline(NodeId::address(BOB)).collect_all().await;
        assert!(cursors.is_empty());
        assert_eq!(err.unwrap().kind, NodeErrorKind::NodeNotExists);
    }

    #[tokio::test]
    async fn test_address_rels_paginate() {
        let (_tmp, db) = open_db();
        seed(&db, PAGE_SIZE as u64 + 5, 10);
        let local = fetcher(db, MockChainReader::new());
        let start = GraphCursor::start(&NodeId::address(ALICE));

        let (first, err) = local.fetch_address_rels(start.clone(), true).collect_all().await;
        assert_eq!(err, None);
        assert!(matches!(first[0], GraphObject::Address(_)));
        let page: Vec<_> =
            first[1..].iter().filter_map(GraphObject::as_relation).cloned().collect();
        assert_eq!(page.len(), PAGE_SIZE);

        let next = start.next_cursor(&page);
        let (second, _) = local.fetch_address_rels(next, false).collect_all().await;
        assert_eq!(second.len(), 5);
        assert_eq!(second[0].as_relation().unwrap().ts, 1_000 + PAGE_SIZE as u64);
    }

    #[tokio::test]
    async fn test_address_rels_of_unknown_address() {
        let (_tmp, db) = open_db();
        let local = fetcher(db, MockChainReader::new());
        let cursor = GraphCursor::start(&NodeId::address(BOB));
        let (objects, err) = local.fetch_address_rels(cursor, true).collect_all().await;
        assert!(objects.is_empty());
        assert!(err.unwrap().is_not_exists());
    }

    #[tokio::test]
    async fn test_block_beyond_head_is_not_exists() {
        let (_tmp, db) = open_db();
        seed(&db, 0, 10);
        let mut reader = MockChainReader::new();
        reader.expect_block_with_transactions().never();
        let local = fetcher(db, reader);
        let (_, err) = local.fetch_block(NodeId::block(11)).collect_all().await;
        assert!(err.unwrap().is_not_exists());
    }

    #[tokio::test]
    async fn test_block_links_miner_and_transactions() {
        let (_tmp, db) = open_db();
        seed(&db, 0, 10);
        let mut reader = MockChainReader::new();
        reader
            .expect_block_with_transactions()
            .returning(|number| Ok(Some(chain_block(number, vec![B256::repeat_byte(9)]))));
        let local = fetcher(db, reader);

        let (objects, err) = local.fetch_block(NodeId::block(5)).collect_all().await;
        assert_eq!(err, None);
        assert_eq!(
            relation_kinds(&objects),
            vec![
                RelationKind::ParentBlock,
                RelationKind::ParentBlock,
                RelationKind::MinedBy,
                RelationKind::ChildTransaction
            ]
        );
        assert!(objects.contains(&GraphObject::Reference(NodeId::address(MINER))));
        let tx = NodeId::transaction(B256::repeat_byte(9));
        assert!(objects.contains(&GraphObject::Reference(tx)));
    }

    #[tokio::test]
    async fn test_head_block_has_no_child_link() {
        let (_tmp, db) = open_db();
        seed(&db, 0, 10);
        let mut reader = MockChainReader::new();
        reader
            .expect_block_with_transactions()
            .returning(|number| Ok(Some(chain_block(number, vec![]))));
        let local = fetcher(db, reader);

        let (objects, _) = local.fetch_block(NodeId::block(10)).collect_all().await;
        assert_eq!(
            relation_kinds(&objects),
            vec![RelationKind::ParentBlock, RelationKind::MinedBy]
        );
    }

    #[tokio::test]
    async fn test_block_reader_failure_is_network_error() {
        let (_tmp, db) = open_db();
        seed(&db, 0, 10);
        let mut reader = MockChainReader::new();
        reader
            .expect_block_with_transactions()
            .returning(|_| Err(ChainReaderError::Malformed("boom".into())));
        let local = fetcher(db, reader);
        let (_, err) = local.fetch_block(NodeId::block(3)).collect_all().await;
        assert!(err.unwrap().is_network());
    }

    #[tokio::test]
    async fn test_contract_creation_transaction() {
        let (_tmp, db) = open_db();
        let hash = B256::repeat_byte(3);
        let mut reader = MockChainReader::new();
        reader.expect_transaction().returning(move |hash| {
            Ok(Some(ChainTransaction {
                record: TransactionRecord {
                    id: NodeId::transaction(hash),
                    hash,
                    block_number: 4,
                    from: ALICE,
                    to: Some(BOB),
                    contract_creation: true,
                    value: U256::from(2),
                    nonce: 0,
                    gas_limit: 100_000,
                    gas_used: 90_000,
                    gas_price: 1,
                    status: true,
                },
                timestamp: 1_700,
            }))
        });
        let local = fetcher(db, reader);

        let (objects, err) = local.fetch_transaction(NodeId::transaction(hash)).collect_all().await;
        assert_eq!(err, None);
        assert!(matches!(objects[0], GraphObject::Transaction(_)));
        assert_eq!(
            relation_kinds(&objects),
            vec![
                RelationKind::ChildTransaction,
                RelationKind::Send,
                RelationKind::Receive,
                RelationKind::ContractCreated
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_transaction() {
        let (_tmp, db) = open_db();
        let mut reader = MockChainReader::new();
        reader.expect_transaction().returning(|_| Ok(None));
        let local = fetcher(db, reader);
        let (_, err) = local.fetch_transaction(NodeId::transaction(B256::ZERO)).collect_all().await;
        assert!(err.unwrap().is_not_exists());
    }

    #[tokio::test]
    async fn test_server_push_defaults_to_initial_state() {
        let (_tmp, db) = open_db();
        let local = fetcher(Arc::clone(&db), MockChainReader::new());
        assert_eq!(local.request_server_push().await.unwrap(), ChainState::default());

        seed(&db, 0, 42);
        assert_eq!(local.request_server_push().await.unwrap().latest_block_number, 42);
    }
}
