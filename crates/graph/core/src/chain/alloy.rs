use crate::chain::{
    BlockNodes, ChainBlock, ChainReader, ChainReaderError, ChainTransaction,
    ens::{self, ENS_REGISTRY, EnsRegistry, EnsResolver},
};
use alloy_consensus::Transaction as _;
use alloy_eips::BlockNumberOrTag;
use alloy_network::{Ethereum, Network, ReceiptResponse, TransactionBuilder, TransactionResponse};
use alloy_primitives::{Address, B256, Bytes};
use alloy_provider::{Provider, RootProvider};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use chaingraph_types::{BlockRecord, NodeId, TransactionRecord};
use tracing::{debug, trace};
use url::Url;

/// [`ChainReader`] over an Ethereum JSON-RPC node.
///
/// The bulk block query relies on the `erigon_getBlockNode` extension.
#[derive(Debug, Clone)]
pub struct AlloyChainReader {
    provider: RootProvider<Ethereum>,
}

impl AlloyChainReader {
    /// Creates a reader over an existing provider.
    pub const fn new(provider: RootProvider<Ethereum>) -> Self {
        Self { provider }
    }

    /// Creates a reader talking to the node at `url` over HTTP.
    pub fn new_http(url: Url) -> Self {
        Self::new(RootProvider::new_http(url))
    }

    async fn block_header(&self, number: u64) -> Result<Option<BlockRecord>, ChainReaderError> {
        Ok(self.block_with_transactions(number).await?.map(|block| block.block))
    }

    async fn view<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return, ChainReaderError> {
        let tx = <Ethereum as Network>::TransactionRequest::default()
            .with_to(to)
            .with_input(call.abi_encode());
        let output = self.provider.call(tx).await?;
        Ok(C::abi_decode_returns(&output)?)
    }

    /// Returns the resolver registered for `node`, if any.
    async fn resolver(&self, node: B256) -> Result<Option<Address>, ChainReaderError> {
        let resolver = self.view(ENS_REGISTRY, EnsRegistry::resolverCall { node }).await?;
        Ok((!resolver.is_zero()).then_some(resolver))
    }
}

#[async_trait]
impl ChainReader for AlloyChainReader {
    async fn block_number(&self) -> Result<u64, ChainReaderError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn gas_price(&self) -> Result<u128, ChainReaderError> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn block_nodes(&self, min: u64, max: u64) -> Result<BlockNodes, ChainReaderError> {
        trace!(target: "chain_reader", min, max, "Fetching block nodes");
        Ok(self.provider.raw_request("erigon_getBlockNode".into(), (min, max)).await?)
    }

    async fn block_with_transactions(
        &self,
        number: u64,
    ) -> Result<Option<ChainBlock>, ChainReaderError> {
        let Some(block) =
            self.provider.get_block_by_number(BlockNumberOrTag::Number(number)).await?
        else {
            return Ok(None);
        };
        let header = &block.header;
        let record = BlockRecord {
            id: NodeId::block(header.number),
            number: header.number,
            hash: header.hash,
            parent_hash: header.parent_hash,
            miner: header.beneficiary,
            timestamp: header.timestamp,
            nonce: header.nonce,
            difficulty: header.difficulty,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            extra_data: header.extra_data.clone(),
        };
        Ok(Some(ChainBlock { block: record, transactions: block.transactions.hashes().collect() }))
    }

    async fn transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, ChainReaderError> {
        let Some(tx) = self.provider.get_transaction_by_hash(hash).await? else {
            return Ok(None);
        };
        let Some(block_number) = tx.block_number else {
            // Still pending, not part of the graph yet.
            return Ok(None);
        };
        let receipt = self.provider.get_transaction_receipt(hash).await?.ok_or_else(|| {
            ChainReaderError::Malformed(format!("missing receipt for mined transaction {hash}"))
        })?;
        let block = self.block_header(block_number).await?.ok_or_else(|| {
            ChainReaderError::Malformed(format!("missing block {block_number} of {hash}"))
        })?;

        let contract_creation = tx.to().is_none();
        let record = TransactionRecord {
            id: NodeId::transaction(hash),
            hash,
            block_number,
            from: tx.from(),
            to: if contract_creation { receipt.contract_address } else { tx.to() },
            contract_creation,
            value: tx.value(),
            nonce: tx.nonce(),
            gas_limit: tx.gas_limit(),
            gas_used: receipt.gas_used,
            gas_price: receipt.effective_gas_price,
            status: receipt.status(),
        };
        Ok(Some(ChainTransaction { record, timestamp: block.timestamp }))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainReaderError> {
        Ok(self.provider.get_code_at(address).await?)
    }

    async fn lookup_name(&self, address: Address) -> Result<Option<String>, ChainReaderError> {
        let node = ens::reverse_node(address);
        let Some(resolver) = self.resolver(node).await? else {
            return Ok(None);
        };
        let name = self.view(resolver, EnsResolver::nameCall { node }).await?;
        if name.is_empty() {
            return Ok(None);
        }

        // A reverse record only counts if the name resolves back to the address.
        let forward = ens::namehash(&name);
        let Some(resolver) = self.resolver(forward).await? else {
            return Ok(None);
        };
        let resolved = self.view(resolver, EnsResolver::addrCall { node: forward }).await?;
        if resolved != address {
            debug!(target: "chain_reader", %address, name, %resolved, "Unverified reverse record");
            return Ok(None);
        }
        Ok(Some(name))
    }
}
