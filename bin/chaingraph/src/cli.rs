//! Contains the chaingraph CLI.

use crate::{
    commands::{BridgeCommand, EdgeCommand, IndexCommand},
    flags::GlobalArgs,
};
use anyhow::Result;
use chaingraph_cli::init_tracing_subscriber;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Subcommands of the chaingraph CLI.
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Indexes the chain into the local graph.
    #[command(alias = "i")]
    Index(IndexCommand),
    /// Serves the local graph over RPC.
    #[command(alias = "b")]
    Bridge(BridgeCommand),
    /// Serves a remote graph through a cache.
    #[command(alias = "e")]
    Edge(EdgeCommand),
}

/// The chaingraph CLI.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global arguments for the CLI.
    #[clap(flatten)]
    pub global: GlobalArgs,
    /// The subcommand to run.
    #[command(subcommand)]
    pub subcommand: Commands,
}

impl Cli {
    /// Runs the CLI.
    pub fn run(self) -> Result<()> {
        Self::init_stack(&self.global)?;

        let Self { global, subcommand } = self;
        Self::run_until_ctrl_c(|cancel| async move {
            match subcommand {
                Commands::Index(cmd) => cmd.run(&global, cancel).await,
                Commands::Bridge(cmd) => cmd.run(&global, cancel).await,
                Commands::Edge(cmd) => cmd.run(&global, cancel).await,
            }
        })
    }

    /// Initializes the tracing stack and the Prometheus exporter.
    pub fn init_stack(global: &GlobalArgs) -> Result<()> {
        init_tracing_subscriber(global.v, None)?;
        global.metrics.init_metrics()?;
        Ok(())
    }

    /// Runs the future built by `run` until it returns, cancelling its token on ctrl-c.
    pub fn run_until_ctrl_c<F, Fut>(run: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let rt = Self::tokio_runtime()?;
        rt.block_on(async {
            let cancel = CancellationToken::new();
            let signal = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!(target: "chaingraph", "Received ctrl-c, shutting down"),
                    Err(err) => warn!(target: "chaingraph", %err, "Failed to listen for ctrl-c"),
                }
                signal.cancel();
            });
            run(cancel).await
        })
    }

    /// Creates a new default tokio multi-thread [Runtime](tokio::runtime::Runtime) with all
    /// features enabled.
    pub fn tokio_runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
        tokio::runtime::Builder::new_multi_thread().enable_all().build()
    }
}
