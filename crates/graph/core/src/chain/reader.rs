use crate::chain::{BlockNodes, ChainBlock, ChainTransaction};
use alloy_primitives::{Address, B256, Bytes};
use alloy_transport::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use std::fmt::Debug;

/// Chain queries used by the indexer, the local fetcher and the enrichment scanners.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainReader: Debug + Send + Sync {
    /// Returns the number of the chain head.
    async fn block_number(&self) -> Result<u64, ChainReaderError>;

    /// Returns the current gas price in wei.
    async fn gas_price(&self) -> Result<u128, ChainReaderError>;

    /// Returns the blocks in `[min, max]` with the balance of every address they touch.
    ///
    /// An empty balance map means the node has not caught up with the range yet.
    async fn block_nodes(&self, min: u64, max: u64) -> Result<BlockNodes, ChainReaderError>;

    /// Returns block `number` with its transaction hashes, or `None` if it does not exist.
    async fn block_with_transactions(
        &self,
        number: u64,
    ) -> Result<Option<ChainBlock>, ChainReaderError>;

    /// Returns the transaction `hash` with its receipt data, or `None` if it does not exist.
    async fn transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, ChainReaderError>;

    /// Returns the code deployed at `address`.
    async fn code_at(&self, address: Address) -> Result<Bytes, ChainReaderError>;

    /// Returns the verified ENS primary name of `address`, or `None` if it has none.
    async fn lookup_name(&self, address: Address) -> Result<Option<String>, ChainReaderError>;
}

/// Error type for [`ChainReader`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainReaderError {
    /// The node request failed.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError<TransportErrorKind>),

    /// A contract call returned data that does not match its ABI.
    #[error("ABI error: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    /// The node answered with data that cannot be interpreted.
    #[error("Malformed response: {0}")]
    Malformed(String),
}
