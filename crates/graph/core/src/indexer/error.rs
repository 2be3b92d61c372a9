use crate::chain::ChainReaderError;
use chaingraph_storage::StorageError;
use thiserror::Error;

/// Errors that stop the [`ChainIndexer`](crate::ChainIndexer).
#[derive(Debug, Error)]
pub enum IndexerError {
    /// A chain query failed.
    #[error(transparent)]
    Chain(#[from] ChainReaderError),

    /// Reading or writing the graph failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<tokio::task::JoinError> for IndexerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Storage(StorageError::Task(err))
    }
}
