//! The `graph` JSON-RPC namespace: every [`GraphFetcher`](chaingraph_types::GraphFetcher)
//! operation as a WebSocket subscription streaming [`FetchFrame`]s.

mod frame;
pub use frame::{FetchFrame, NODE_ERROR_CODE};

#[cfg(feature = "jsonrpsee")]
mod api;
#[cfg(feature = "client")]
pub use api::GraphApiClient;
#[cfg(feature = "jsonrpsee")]
pub use api::GraphApiServer;

#[cfg(feature = "client")]
mod error;
#[cfg(feature = "client")]
pub use error::RpcError;

#[cfg(feature = "client")]
mod remote;
#[cfg(feature = "client")]
pub use remote::{RemoteFetcher, RemoteFetcherConfig};
