//! Server side of the `graph` RPC namespace.

use crate::metrics::Metrics;
use async_trait::async_trait;
use chaingraph_rpc::{FetchFrame, GraphApiServer, NODE_ERROR_CODE};
use chaingraph_types::{ChainState, FetchStep, FetchStream, GraphCursor, GraphFetcher, NodeId};
use jsonrpsee::{
    core::{RpcResult, SubscriptionError},
    server::{PendingSubscriptionSink, ServerBuilder, ServerHandle, SubscriptionMessage},
    types::ErrorObject,
};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, error, trace, warn};

/// Serves any [`GraphFetcher`] over the `graph` RPC namespace.
#[derive(Debug)]
pub struct GraphRpc<F: ?Sized> {
    fetcher: Arc<F>,
}

impl<F: ?Sized> Clone for GraphRpc<F> {
    fn clone(&self) -> Self {
        Self { fetcher: Arc::clone(&self.fetcher) }
    }
}

impl<F> GraphRpc<F>
where
    F: GraphFetcher + ?Sized + 'static,
{
    /// Creates a new [`GraphRpc`] serving `fetcher`.
    pub fn new(fetcher: Arc<F>) -> Self {
        Metrics::init();
        trace!(target: "graph_rpc", "Creating new GraphRpc handler");
        Self { fetcher }
    }

    /// Starts a WebSocket and HTTP server on `addr`. Returns the bound address and the handle
    /// that stops it.
    pub async fn launch(self, addr: SocketAddr) -> std::io::Result<(SocketAddr, ServerHandle)> {
        let server = ServerBuilder::default().build(addr).await?;
        let local_addr = server.local_addr()?;
        Ok((local_addr, server.start(self.into_rpc())))
    }
}

/// Streams the steps of `fetch` to the subscriber as [`FetchFrame`]s, ending after the terminal
/// frame or when the subscriber goes away.
fn relay<T>(pending: PendingSubscriptionSink, mut fetch: FetchStream<T>)
where
    T: Serialize + Send + 'static,
{
    tokio::spawn(async move {
        let sink = match pending.accept().await {
            Ok(sink) => sink,
            Err(err) => {
                warn!(target: "graph_rpc", ?err, "Failed to accept subscription");
                return;
            }
        };
        loop {
            let step = fetch.next().await;
            let done = matches!(step, FetchStep::Done(_));
            let frame = FetchFrame::from(step);
            let message =
                match SubscriptionMessage::new(sink.method_name(), sink.subscription_id(), &frame) {
                    Ok(message) => message,
                    Err(err) => {
                        error!(target: "graph_rpc", ?err, "Failed to encode fetch frame");
                        return;
                    }
                };
            if let Err(err) = sink.send(message).await {
                debug!(target: "graph_rpc", ?err, "Subscriber went away");
                return;
            }
            if done {
                return;
            }
        }
    });
}

#[async_trait]
impl<F> GraphApiServer for GraphRpc<F>
where
    F: GraphFetcher + ?Sized + 'static,
{
    async fn address_timeline(
        &self,
        pending: PendingSubscriptionSink,
        id: NodeId,
    ) -> Result<(), SubscriptionError> {
        trace!(target: "graph_rpc", %id, "Received address_timeline subscription");
        Metrics::record_subscription("address_timeline");
        relay(pending, self.fetcher.fetch_address_timeline(id));
        Ok(())
    }

    async fn address_rels(
        &self,
        pending: PendingSubscriptionSink,
        cursor: GraphCursor,
        include_address: bool,
    ) -> Result<(), SubscriptionError> {
        trace!(target: "graph_rpc", %cursor, include_address, "Received address_rels request");
        Metrics::record_subscription("address_rels");
        relay(pending, self.fetcher.fetch_address_rels(cursor, include_address));
        Ok(())
    }

    async fn block(
        &self,
        pending: PendingSubscriptionSink,
        id: NodeId,
    ) -> Result<(), SubscriptionError> {
        trace!(target: "graph_rpc", %id, "Received block subscription");
        Metrics::record_subscription("block");
        relay(pending, self.fetcher.fetch_block(id));
        Ok(())
    }

    async fn transaction(
        &self,
        pending: PendingSubscriptionSink,
        id: NodeId,
    ) -> Result<(), SubscriptionError> {
        trace!(target: "graph_rpc", %id, "Received transaction subscription");
        Metrics::record_subscription("transaction");
        relay(pending, self.fetcher.fetch_transaction(id));
        Ok(())
    }

    async fn request_server_push(&self) -> RpcResult<ChainState> {
        trace!(target: "graph_rpc", "Received request_server_push request");
        self.fetcher.request_server_push().await.map_err(|err| {
            ErrorObject::owned(NODE_ERROR_CODE, err.user_message.clone(), Some(err))
        })
    }
}
