use crate::{GraphActor, ServiceError};
use async_trait::async_trait;
use chaingraph_core::{
    ChainIndexer, ChainReader, CodeIndexer, EnsIndexer, IndexerExit, MemoryProbe, ProcMemoryProbe,
};
use tracing::{info, warn};

/// Runs the [`ChainIndexer`]. Any exit other than cancellation is reported as an error so the
/// process can be restarted.
#[derive(Debug)]
pub struct IndexerActor<R, M = ProcMemoryProbe> {
    indexer: ChainIndexer<R, M>,
}

impl<R, M> IndexerActor<R, M> {
    /// Creates a new [`IndexerActor`].
    pub const fn new(indexer: ChainIndexer<R, M>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl<R, M> GraphActor for IndexerActor<R, M>
where
    R: ChainReader + 'static,
    M: MemoryProbe + 'static,
{
    type Error = ServiceError;

    async fn start(self) -> Result<(), Self::Error> {
        info!(target: "graph::indexer_actor", "Starting indexer actor");
        match self.indexer.run().await? {
            IndexerExit::Cancelled => Ok(()),
            exit => {
                warn!(target: "graph::indexer_actor", ?exit, "Indexer gave up");
                Err(ServiceError::IndexerStopped(exit))
            }
        }
    }
}

/// Runs the [`CodeIndexer`] until cancelled.
#[derive(Debug)]
pub struct CodeIndexerActor<R> {
    indexer: CodeIndexer<R>,
}

impl<R> CodeIndexerActor<R> {
    /// Creates a new [`CodeIndexerActor`].
    pub const fn new(indexer: CodeIndexer<R>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl<R> GraphActor for CodeIndexerActor<R>
where
    R: ChainReader + 'static,
{
    type Error = ServiceError;

    async fn start(self) -> Result<(), Self::Error> {
        info!(target: "graph::code_indexer_actor", "Starting code indexer actor");
        let hashed = self.indexer.run().await?;
        info!(target: "graph::code_indexer_actor", hashed, "Code indexer actor stopped");
        Ok(())
    }
}

/// Runs the [`EnsIndexer`] until cancelled.
#[derive(Debug)]
pub struct EnsIndexerActor<R> {
    indexer: EnsIndexer<R>,
}

impl<R> EnsIndexerActor<R> {
    /// Creates a new [`EnsIndexerActor`].
    pub const fn new(indexer: EnsIndexer<R>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl<R> GraphActor for EnsIndexerActor<R>
where
    R: ChainReader + 'static,
{
    type Error = ServiceError;

    async fn start(self) -> Result<(), Self::Error> {
        info!(target: "graph::ens_indexer_actor", "Starting ENS indexer actor");
        let named = self.indexer.run().await?;
        info!(target: "graph::ens_indexer_actor", named, "ENS indexer actor stopped");
        Ok(())
    }
}
