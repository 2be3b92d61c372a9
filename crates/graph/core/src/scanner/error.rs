use chaingraph_storage::StorageError;
use thiserror::Error;

/// Errors that end a scan.
///
/// Both variants are fatal: the keyspace or its schema is not what the scanner was built for,
/// and retrying would fail the same way.
#[derive(Debug, Error)]
pub enum ScannerError {
    /// A key of the scanned table is not a valid UTF-8 string.
    #[error("malformed key in table {table}: {key}")]
    MalformedKey {
        /// The scanned table.
        table: &'static str,
        /// Lossy rendering of the key.
        key: String,
    },

    /// Reading the table or persisting progress failed.
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ScannerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::MalformedKey { table, key } => Self::MalformedKey { table, key },
            other => Self::Storage(other),
        }
    }
}
