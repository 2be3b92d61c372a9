//! Read access to the source chain.

mod reader;
pub use reader::{ChainReader, ChainReaderError};

#[cfg(test)]
pub(crate) use reader::MockChainReader;

mod types;
pub use types::{BlockNode, BlockNodes, ChainBlock, ChainTransaction, RawBlock, RawTransaction};

mod ens;

mod alloy;
pub use alloy::AlloyChainReader;
