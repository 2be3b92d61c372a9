//! Read and write access to typed tables.

use crate::{StorageError, models::Table};

/// Read access to the tables of the graph database.
pub trait DbRead {
    /// Gets the value stored under `key`.
    fn get<T: Table>(&self, key: &str) -> Result<Option<T::Value>, StorageError>;

    /// Returns true if `key` is present.
    fn exists<T: Table>(&self, key: &str) -> Result<bool, StorageError>;

    /// Returns up to `limit` entries in key order, starting at `start` (inclusive) or at the
    /// first key of the table.
    fn range_from<T: Table>(
        &self,
        start: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, T::Value)>, StorageError>;

    /// Returns up to `limit` keys in key order, starting at `start` (inclusive) after skipping
    /// `offset` keys.
    fn keys_from<T: Table>(
        &self,
        start: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, StorageError>;
}

/// Write access to the tables of the graph database.
pub trait DbWrite: DbRead {
    /// Stores `value` under `key`, replacing any previous value.
    fn put<T: Table>(&self, key: &str, value: &T::Value) -> Result<(), StorageError>;

    /// Removes `key`.
    fn delete<T: Table>(&self, key: &str) -> Result<(), StorageError>;
}
