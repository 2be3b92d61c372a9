use chaingraph_core::{EnrichError, IndexerError, IndexerExit};

/// Error type of the [`GraphActor`](crate::GraphActor)s.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The RPC server could not be started.
    #[error("RPC server error: {0}")]
    Rpc(#[from] std::io::Error),

    /// The indexer failed.
    #[error(transparent)]
    Indexer(#[from] IndexerError),

    /// The indexer gave up without being cancelled.
    #[error("Indexer stopped: {0:?}")]
    IndexerStopped(IndexerExit),

    /// An enrichment scanner failed.
    #[error(transparent)]
    Enrich(#[from] EnrichError),

    /// An actor task panicked or was aborted.
    #[error("Actor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
