//! Long running actors of a chaingraph process.
//!
//! Each [`GraphActor`] wraps one component of `chaingraph-core`: the chain indexer, an
//! enrichment scanner, the graph RPC server or the periodic metric reporter.
//! [`GraphService`] runs a set of actors and cancels the rest as soon as one of them fails.

mod actors;
pub use actors::{
    CodeIndexerActor, EnsIndexerActor, GraphActor, IndexerActor, MetricReporter, RpcActor,
};

mod error;
pub use error::ServiceError;

mod metrics;

mod reporter;
pub use reporter::{GraphStatsReporter, MetricsReporter};

mod service;
pub use service::GraphService;
