//! Bridge Subcommand

use crate::flags::GlobalArgs;
use chaingraph_core::{AlloyChainReader, CodeIndexer, EnsIndexer, LocalFetcher};
use chaingraph_service::{
    GraphService, GraphStatsReporter, MetricReporter, MetricsReporter, RpcActor,
};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

/// The `bridge` Subcommand
///
/// Serves the graph in the data directory without indexing. Blocks and transactions are read
/// from the chain node.
///
/// # Usage
///
/// ```sh
/// chaingraph bridge --rpc.url http://localhost:8545 [OPTIONS]
/// ```
#[derive(Parser, Debug, Clone)]
#[command(about = "Serves the local graph over RPC")]
pub struct BridgeCommand {
    /// HTTP url of the chain node.
    #[arg(long = "rpc.url", env = "CHAINGRAPH_RPC_URL")]
    pub rpc_url: Url,
    /// Address the graph server listens on.
    #[arg(long = "serve.addr", default_value = "0.0.0.0:9545", env = "CHAINGRAPH_SERVE_ADDR")]
    pub serve_addr: SocketAddr,
    /// Seconds between two reports of the graph watermarks.
    #[arg(long = "metrics.interval", default_value_t = 15, env = "CHAINGRAPH_METRICS_INTERVAL")]
    pub metrics_interval_secs: u64,
}

impl BridgeCommand {
    /// Run the Bridge subcommand.
    pub async fn run(self, global: &GlobalArgs, cancel: CancellationToken) -> anyhow::Result<()> {
        let db = global.open_graph()?;
        let reader = Arc::new(AlloyChainReader::new_http(self.rpc_url.clone()));
        info!(target: "chaingraph", addr = %self.serve_addr, "Serving local graph");

        let reporter = Arc::new(GraphStatsReporter::new(
            Arc::clone(&db),
            vec![
                CodeIndexer::<AlloyChainReader>::SCANNER_NAME,
                EnsIndexer::<AlloyChainReader>::SCANNER_NAME,
            ],
        ));
        let fetcher = Arc::new(LocalFetcher::new(db, reader));

        let mut service = GraphService::new(cancel.clone());
        service.spawn("rpc", RpcActor::new(self.serve_addr, fetcher, cancel.clone()));
        service.spawn(
            "metric_reporter",
            MetricReporter::new(
                Duration::from_secs(self.metrics_interval_secs),
                vec![reporter as Arc<dyn MetricsReporter>],
                cancel,
            ),
        );
        service.run().await?;
        Ok(())
    }
}
