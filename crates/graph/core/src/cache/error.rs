use chaingraph_storage::StorageError;
use thiserror::Error;

/// Errors raised by [`Cache`](crate::Cache) backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The disk cache failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The Redis server failed or is unreachable.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A cached value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
