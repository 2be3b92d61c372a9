//! Global arguments for the CLI.

use chaingraph_cli::MetricsArgs;
use chaingraph_storage::GraphDb;
use clap::{ArgAction, Parser};
use std::{path::PathBuf, sync::Arc};

/// Global arguments for the CLI.
#[derive(Parser, Clone, Debug)]
pub struct GlobalArgs {
    /// Verbosity level (0-2).
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub v: u8,
    /// Directory holding the graph database and the disk cache.
    #[arg(long = "datadir", global = true, default_value = "data", env = "CHAINGRAPH_DATADIR")]
    pub data_dir: PathBuf,
    /// Prometheus CLI arguments.
    #[command(flatten)]
    pub metrics: MetricsArgs,
}

impl GlobalArgs {
    /// Path of the graph database.
    pub fn graph_path(&self) -> PathBuf {
        self.data_dir.join("graph")
    }

    /// Path of the disk cache.
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    /// Opens the graph database, creating the data directory if needed.
    pub fn open_graph(&self) -> anyhow::Result<Arc<GraphDb>> {
        self.open_db(self.graph_path())
    }

    /// Opens the disk cache database, creating the data directory if needed.
    pub fn open_cache(&self) -> anyhow::Result<Arc<GraphDb>> {
        self.open_db(self.cache_path())
    }

    fn open_db(&self, path: PathBuf) -> anyhow::Result<Arc<GraphDb>> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(Arc::new(GraphDb::open(&path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = GlobalArgs::try_parse_from(["test"]).unwrap();
        assert_eq!(args.v, 0);
        assert_eq!(args.graph_path(), PathBuf::from("data/graph"));
        assert_eq!(args.metrics.port, None);
    }

    #[test]
    fn test_verbosity_and_datadir() {
        let args = GlobalArgs::try_parse_from(["test", "-vv", "--datadir", "/tmp/cg"]).unwrap();
        assert_eq!(args.v, 2);
        assert_eq!(args.cache_path(), PathBuf::from("/tmp/cg/cache"));
    }

    #[test]
    fn test_open_graph_creates_data_dir() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let data_dir = tmp_dir.path().join("nested");
        let args =
            GlobalArgs::try_parse_from(["test", "--datadir", data_dir.to_str().unwrap()]).unwrap();
        args.open_graph().unwrap();
        assert!(args.graph_path().exists());
    }
}
