use crate::{chain::ChainReaderError, scanner::ScannerError};
use chaingraph_storage::StorageError;
use thiserror::Error;

/// Fatal failures of the enrichment scanners.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// The address scan failed.
    #[error(transparent)]
    Scanner(#[from] ScannerError),

    /// Reading or writing enrichment data failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Querying the chain failed.
    #[error(transparent)]
    Chain(#[from] ChainReaderError),
}
