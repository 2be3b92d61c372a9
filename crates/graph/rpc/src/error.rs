use jsonrpsee::core::ClientError;
use thiserror::Error;

/// Failures of the [`RemoteFetcher`](crate::RemoteFetcher) outside of individual fetches.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The WebSocket connection could not be established.
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        /// The server url.
        url: String,
        /// The last connection error.
        #[source]
        source: ClientError,
    },
}
