use crate::{
    AddressUpserted, EventBus,
    chain::ChainReader,
    enrich::{EnrichError, forward::forward_addresses},
    scanner::Scanner,
};
use alloy_primitives::keccak256;
use chaingraph_storage::{CodeStorage, GraphDb, models::Addresses};
use chaingraph_types::AddressRecord;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fingerprints the bytecode of every contract so contracts deployed with the same code can be
/// found from each other.
///
/// Replays the address table with a [`Scanner`] named [`CodeIndexer::SCANNER_NAME`], then
/// follows contracts upserted by the indexer.
#[derive(Debug)]
pub struct CodeIndexer<R> {
    scanner: Scanner<Addresses>,
    db: Arc<GraphDb>,
    reader: Arc<R>,
    updates: broadcast::Receiver<AddressUpserted>,
    cancel: CancellationToken,
}

impl<R> CodeIndexer<R>
where
    R: ChainReader + 'static,
{
    /// Name under which the scan progress is persisted.
    pub const SCANNER_NAME: &'static str = "code";

    /// Creates a new [`CodeIndexer`], subscribing to address upserts right away.
    pub fn new(
        db: Arc<GraphDb>,
        reader: Arc<R>,
        events: &EventBus,
        cancel: CancellationToken,
    ) -> Result<Self, EnrichError> {
        let scanner = Scanner::new(Self::SCANNER_NAME, Arc::clone(&db), cancel.clone())?;
        Ok(Self { scanner, db, reader, updates: events.subscribe_addresses(), cancel })
    }

    /// Restarts the scan from the first address.
    pub fn reset(&mut self) -> Result<(), EnrichError> {
        self.scanner.reset()?;
        Ok(())
    }

    /// Runs until cancelled. Returns the number of contracts fingerprinted.
    pub async fn run(self) -> Result<u64, EnrichError> {
        let Self { mut scanner, db, reader, updates, cancel } = self;
        let forwarder = tokio::spawn(forward_addresses(
            Self::SCANNER_NAME,
            updates,
            scanner.notifier(),
            AddressRecord::is_contract,
            cancel.clone(),
        ));

        let mut hashed = 0;
        let result = loop {
            let address = match scanner.next().await {
                Ok(Some((_, address))) => address,
                Ok(None) => break Ok(hashed),
                Err(err) => break Err(err.into()),
            };
            match fingerprint(&db, reader.as_ref(), &address).await {
                Ok(true) => hashed += 1,
                Ok(false) => {}
                Err(err) => break Err(err),
            }
        };
        forwarder.abort();

        match &result {
            Ok(hashed) => info!(
                target: "code_indexer",
                hashed,
                "Code indexer cancellation requested, stopping..."
            ),
            Err(err) => warn!(target: "code_indexer", ?err, "Code indexer failed"),
        }
        result
    }
}

/// Stores the code hash of `address`. Returns false for wallets and contracts already hashed.
async fn fingerprint<R: ChainReader>(
    db: &GraphDb,
    reader: &R,
    address: &AddressRecord,
) -> Result<bool, EnrichError> {
    if !address.is_contract() || db.code_hash(&address.id)?.is_some() {
        return Ok(false);
    }
    let Some(raw) = address.id.as_address() else {
        warn!(target: "code_indexer", id = %address.id, "Skipping contract with malformed id");
        return Ok(false);
    };
    let code = reader.code_at(raw).await?;
    let hash = keccak256(&code);
    db.save_code_hash(&address.id, hash)?;
    debug!(target: "code_indexer", id = %address.id, %hash, size = code.len(), "Stored code hash");
    Ok(true)
}
