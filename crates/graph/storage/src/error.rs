use thiserror::Error;

/// Errors that may occur while interacting with graph storage.
///
/// This enum is used across all implementations of the storage traits.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error reported by RocksDB.
    #[error("Database error")]
    Database(#[from] rocksdb::Error),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    /// The expected entry was not found in the database.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// A stored key is not valid UTF-8 or not a valid id.
    #[error("Malformed key in table {table}: {key}")]
    MalformedKey {
        /// The table holding the key.
        table: &'static str,
        /// Lossy rendering of the key.
        key: String,
    },

    /// The column family of a table was not opened.
    #[error("Missing table: {0}")]
    MissingTable(&'static str),

    /// A relation that cannot be filed under an address.
    #[error("Relation {0} has no address anchor")]
    UnanchoredRelation(String),

    /// A blocking storage task failed to complete.
    #[error("Storage task failed")]
    Task(#[from] tokio::task::JoinError),
}
