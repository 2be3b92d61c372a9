//! Persisted watermarks.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Key of the chain state record inside its keyspace.
///
/// Entity ids always contain a `,`, so this can never collide with one.
pub const CHAIN_STATE_KEY: &str = "_chain";

/// Prefix of a scanner's progress key.
pub const SCAN_STATE_PREFIX: &str = "__scan-";

/// Returns the progress key of the scanner called `name`.
pub fn scan_state_key(name: &str) -> String {
    format!("{SCAN_STATE_PREFIX}{name}")
}

/// The indexer's watermark, also served to clients as the chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainState {
    /// Last fully indexed block.
    pub latest_block_number: u64,
    /// Timestamp of that block in milliseconds.
    pub latest_timestamp_ms: u64,
    /// Gas price observed when the block was indexed.
    pub latest_gas_price: U256,
}

/// Progress of a named scanner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanState {
    /// The greatest key processed so far.
    pub last_processed_key: Option<String>,
    /// True once the scanner has caught up with history and is tailing live updates.
    pub is_synced: bool,
    /// Number of live updates processed.
    pub processed_count: u64,
}
