//! Index Subcommand

use crate::flags::GlobalArgs;
use chaingraph_core::{
    AlloyChainReader, ChainIndexer, CodeIndexer, EnsIndexer, EventBus, IndexerConfig,
    LocalFetcher,
};
use chaingraph_service::{
    CodeIndexerActor, EnsIndexerActor, GraphService, GraphStatsReporter, IndexerActor,
    MetricReporter, MetricsReporter, RpcActor,
};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

/// The `index` Subcommand
///
/// Follows the chain from the persisted chain state, fingerprints contract code, names
/// addresses after their ENS name and optionally serves the graph while it grows.
///
/// # Usage
///
/// ```sh
/// chaingraph index --rpc.url http://localhost:8545 [OPTIONS]
/// ```
#[derive(Parser, Debug, Clone)]
#[command(about = "Indexes the chain into the local graph")]
pub struct IndexCommand {
    /// HTTP url of the chain node.
    #[arg(long = "rpc.url", env = "CHAINGRAPH_RPC_URL")]
    pub rpc_url: Url,
    /// First block to index, unless the persisted chain state is already past it.
    #[arg(long = "start-block", env = "CHAINGRAPH_START_BLOCK")]
    pub start_block: Option<u64>,
    /// Blocks fetched per iteration.
    #[arg(
        long = "batch-size",
        default_value_t = IndexerConfig::DEFAULT_BATCH_SIZE,
        env = "CHAINGRAPH_BATCH_SIZE"
    )]
    pub batch_size: u64,
    /// Resident memory ceiling in MiB.
    #[arg(long = "memory-ceiling", default_value_t = 2048, env = "CHAINGRAPH_MEMORY_CEILING")]
    pub memory_ceiling_mib: u64,
    /// Seconds between chain head polls once the indexer caught up.
    #[arg(long = "poll-interval", default_value_t = 10, env = "CHAINGRAPH_POLL_INTERVAL")]
    pub poll_interval_secs: u64,
    /// Head polls without progress before the indexer gives up.
    #[arg(long = "max-poll-retries", default_value_t = 20, env = "CHAINGRAPH_MAX_POLL_RETRIES")]
    pub max_poll_retries: u32,
    /// Restart code fingerprinting from the first address.
    #[arg(long = "restart.code", env = "CHAINGRAPH_RESTART_CODE")]
    pub restart_code: bool,
    /// Do not fingerprint contract code.
    #[arg(long = "no-code", env = "CHAINGRAPH_NO_CODE")]
    pub no_code: bool,
    /// Restart ENS naming from the first address.
    #[arg(long = "restart.ens", env = "CHAINGRAPH_RESTART_ENS")]
    pub restart_ens: bool,
    /// Do not look up ENS names.
    #[arg(long = "no-ens", env = "CHAINGRAPH_NO_ENS")]
    pub no_ens: bool,
    /// Serve the local graph on this address while indexing.
    #[arg(long = "serve.addr", env = "CHAINGRAPH_SERVE_ADDR")]
    pub serve_addr: Option<SocketAddr>,
    /// Seconds between two reports of the graph watermarks.
    #[arg(long = "metrics.interval", default_value_t = 15, env = "CHAINGRAPH_METRICS_INTERVAL")]
    pub metrics_interval_secs: u64,
}

impl IndexCommand {
    /// The [`IndexerConfig`] selected by the flags.
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            batch_size: self.batch_size,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_poll_retries: self.max_poll_retries,
            memory_ceiling_bytes: self.memory_ceiling_mib.saturating_mul(1024 * 1024),
            start_block: self.start_block,
            ..Default::default()
        }
    }

    /// Run the Index subcommand.
    pub async fn run(self, global: &GlobalArgs, cancel: CancellationToken) -> anyhow::Result<()> {
        let db = global.open_graph()?;
        let reader = Arc::new(AlloyChainReader::new_http(self.rpc_url.clone()));
        let events = EventBus::default();
        let mut service = GraphService::new(cancel.clone());
        info!(target: "chaingraph", rpc = %self.rpc_url, "Indexing chain");

        let mut scanners = Vec::new();
        if !self.no_code {
            let mut code =
                CodeIndexer::new(Arc::clone(&db), Arc::clone(&reader), &events, cancel.clone())?;
            if self.restart_code {
                code.reset()?;
            }
            scanners.push(CodeIndexer::<AlloyChainReader>::SCANNER_NAME);
            service.spawn("code_indexer", CodeIndexerActor::new(code));
        }
        if !self.no_ens {
            let mut ens =
                EnsIndexer::new(Arc::clone(&db), Arc::clone(&reader), &events, cancel.clone())?;
            if self.restart_ens {
                ens.reset()?;
            }
            scanners.push(EnsIndexer::<AlloyChainReader>::SCANNER_NAME);
            service.spawn("ens_indexer", EnsIndexerActor::new(ens));
        }

        if let Some(addr) = self.serve_addr {
            let fetcher = Arc::new(LocalFetcher::new(Arc::clone(&db), Arc::clone(&reader)));
            service.spawn("rpc", RpcActor::new(addr, fetcher, cancel.clone()));
        }

        let reporter = Arc::new(GraphStatsReporter::new(Arc::clone(&db), scanners));
        service.spawn(
            "metric_reporter",
            MetricReporter::new(
                Duration::from_secs(self.metrics_interval_secs),
                vec![reporter as Arc<dyn MetricsReporter>],
                cancel.clone(),
            ),
        );

        let indexer = ChainIndexer::new(reader, db, events, self.indexer_config(), cancel);
        service.spawn("indexer", IndexerActor::new(indexer));
        service.run().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexer_config() {
        let cmd = IndexCommand::try_parse_from([
            "index",
            "--rpc.url",
            "http://localhost:8545",
            "--start-block",
            "1000",
            "--memory-ceiling",
            "512",
            "--batch-size",
            "8",
        ])
        .unwrap();
        let config = cmd.indexer_config();
        assert_eq!(config.start_block, Some(1000));
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.memory_ceiling_bytes, 512 * 1024 * 1024);
        assert_eq!(config.max_poll_retries, IndexerConfig::default().max_poll_retries);
        assert!(!cmd.no_code);
        assert!(!cmd.no_ens);
        assert_eq!(cmd.serve_addr, None);
    }

    #[test]
    fn test_enrichment_flags() {
        let cmd = IndexCommand::try_parse_from([
            "index",
            "--rpc.url",
            "http://localhost:8545",
            "--no-code",
            "--restart.ens",
        ])
        .unwrap();
        assert!(cmd.no_code);
        assert!(!cmd.no_ens);
        assert!(cmd.restart_ens);
    }
}
