//! [GraphActor] services of a chaingraph process.
//!
//! [GraphActor]: super::GraphActor

mod traits;
pub use traits::GraphActor;

mod indexer;
pub use indexer::{CodeIndexerActor, EnsIndexerActor, IndexerActor};

mod metric_reporter;
pub use metric_reporter::MetricReporter;

mod rpc;
pub use rpc::RpcActor;
