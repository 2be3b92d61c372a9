use crate::{GraphActor, ServiceError};
use async_trait::async_trait;
use chaingraph_core::GraphRpc;
use chaingraph_types::GraphFetcher;
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Serves a [`GraphFetcher`] over the graph RPC namespace until cancelled.
#[derive(Debug)]
pub struct RpcActor<F: ?Sized> {
    rpc_addr: SocketAddr,
    fetcher: Arc<F>,
    cancel_token: CancellationToken,
}

impl<F> RpcActor<F>
where
    F: GraphFetcher + ?Sized + 'static,
{
    /// Creates a new [`RpcActor`] serving `fetcher` on `rpc_addr`.
    pub const fn new(
        rpc_addr: SocketAddr,
        fetcher: Arc<F>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self { rpc_addr, fetcher, cancel_token }
    }
}

#[async_trait]
impl<F> GraphActor for RpcActor<F>
where
    F: GraphFetcher + ?Sized + 'static,
{
    type Error = ServiceError;

    async fn start(self) -> Result<(), Self::Error> {
        let (addr, handle) = GraphRpc::new(self.fetcher).launch(self.rpc_addr).await?;
        info!(target: "graph::rpc_actor", %addr, "Starting graph RPC actor");

        tokio::select! {
            _ = self.cancel_token.cancelled() => {
                info!(target: "graph::rpc_actor", "Cancellation requested, stopping RPC server...");
                if handle.stop().is_err() {
                    debug!(target: "graph::rpc_actor", "RPC server already stopped");
                }
            }
            _ = handle.clone().stopped() => {
                info!(target: "graph::rpc_actor", "Graph RPC server stopped");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaingraph_types::{ChainState, FetchStream, GraphCursor, GraphObject, NodeError, NodeId};
    use std::time::Duration;
    use tokio::time::timeout;

    #[derive(Debug)]
    struct EmptyFetcher;

    #[async_trait]
    impl GraphFetcher for EmptyFetcher {
        fn fetch_address_timeline(&self, _id: NodeId) -> FetchStream<GraphCursor> {
            FetchStream::failed(NodeError::not_exists("Not found", "empty"))
        }

        fn fetch_address_rels(&self, _: GraphCursor, _: bool) -> FetchStream<GraphObject> {
            FetchStream::failed(NodeError::not_exists("Not found", "empty"))
        }

        fn fetch_block(&self, _id: NodeId) -> FetchStream<GraphObject> {
            FetchStream::failed(NodeError::not_exists("Not found", "empty"))
        }

        fn fetch_transaction(&self, _id: NodeId) -> FetchStream<GraphObject> {
            FetchStream::failed(NodeError::not_exists("Not found", "empty"))
        }

        async fn request_server_push(&self) -> Result<ChainState, NodeError> {
            Ok(ChainState::default())
        }
    }

    #[tokio::test]
    async fn test_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let actor =
            RpcActor::new("127.0.0.1:0".parse().unwrap(), Arc::new(EmptyFetcher), cancel.clone());
        let task = tokio::spawn(actor.start());
        cancel.cancel();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let actor = RpcActor::new(addr, Arc::new(EmptyFetcher), CancellationToken::new());
        assert!(matches!(actor.start().await, Err(ServiceError::Rpc(_))));
    }
}
