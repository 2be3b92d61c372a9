use crate::{FetchFrame, GraphApiClient, NODE_ERROR_CODE, RpcError};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chaingraph_types::{
    ChainState, FetchStep, FetchStream, GraphCursor, GraphFetcher, GraphObject, NodeError, NodeId,
};
use futures::{StreamExt, future::BoxFuture};
use jsonrpsee::{
    core::{ClientError, client::Subscription},
    ws_client::{WsClient, WsClientBuilder},
};
use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tracing::{info, warn};

type OpenSubscription<T> = BoxFuture<'static, Result<Subscription<FetchFrame<T>>, ClientError>>;

/// Connection settings of a [`RemoteFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFetcherConfig {
    /// WebSocket url of the graph server.
    pub url: String,
    /// Retries of the initial connection.
    pub connect_retries: usize,
    /// Longest wait for a single frame or call.
    pub call_timeout: Duration,
}

impl RemoteFetcherConfig {
    /// Default settings for the server at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), connect_retries: 5, call_timeout: Duration::from_secs(30) }
    }
}

fn transport_failure(err: &ClientError) -> NodeError {
    warn!(target: "graph_rpc", ?err, "Graph server request failed");
    NodeError::network("The graph server is unreachable, please try again shortly", err.to_string())
}

/// Decodes the [`NodeError`] a server attached to a call error.
fn node_error(err: &ClientError) -> NodeError {
    if let ClientError::Call(call) = err {
        if call.code() == NODE_ERROR_CODE {
            let data = call.data().and_then(|raw| serde_json::from_str(raw.get()).ok());
            if let Some(node_err) = data {
                return node_err;
            }
        }
    }
    transport_failure(err)
}

#[derive(Debug)]
struct Connection {
    config: RemoteFetcherConfig,
    client: RwLock<Arc<WsClient>>,
}

impl Connection {
    /// Returns a connected client, reconnecting once if the connection dropped.
    async fn client(&self) -> Result<Arc<WsClient>, ClientError> {
        {
            let client = self.client.read().await;
            if client.is_connected() {
                return Ok(Arc::clone(&client));
            }
        }
        let mut client = self.client.write().await;
        if !client.is_connected() {
            warn!(target: "graph_rpc", url = %self.config.url, "Graph server connection lost");
            *client = Arc::new(WsClientBuilder::default().build(&self.config.url).await?);
        }
        Ok(Arc::clone(&client))
    }
}

/// [`GraphFetcher`] forwarding every operation to a graph server over WebSocket.
///
/// Transport failures, undecodable frames and timeouts end the fetch with a network error.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    inner: Arc<Connection>,
}

impl RemoteFetcher {
    /// Connects to the server of `config`, retrying with exponential backoff.
    pub async fn connect(config: RemoteFetcherConfig) -> Result<Self, RpcError> {
        let url = config.url.as_str();
        let client = (|| WsClientBuilder::default().build(url))
            .retry(ExponentialBuilder::default().with_max_times(config.connect_retries))
            .sleep(tokio::time::sleep)
            .notify(|err, after| {
                warn!(target: "graph_rpc", ?err, ?after, url, "Connecting to graph server failed");
            })
            .await
            .map_err(|source| RpcError::Connect { url: config.url.clone(), source })?;
        info!(target: "graph_rpc", url, "Connected to graph server");

        Ok(Self { inner: Arc::new(Connection { client: RwLock::new(Arc::new(client)), config }) })
    }

    /// The connection settings.
    pub fn config(&self) -> &RemoteFetcherConfig {
        &self.inner.config
    }

    /// Relays the frames of the subscription opened by `open`.
    fn relay<T, F>(&self, open: F) -> FetchStream<T>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Arc<WsClient>) -> OpenSubscription<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let call_timeout = inner.config.call_timeout;
        FetchStream::new(async_stream::stream! {
            let subscription = match inner.client().await {
                Ok(client) => open(client).await,
                Err(err) => Err(err),
            };
            let mut subscription = match subscription {
                Ok(subscription) => subscription,
                Err(err) => {
                    let err = transport_failure(&err);
                    yield FetchStep::Done(Some(err));
                    return;
                }
            };
            loop {
                let frame = subscription.next().await;
                match frame {
                    Some(Ok(FetchFrame::Batch(batch))) => yield FetchStep::Yielded(batch),
                    Some(Ok(FetchFrame::Done(result))) => {
                        yield FetchStep::Done(result);
                        break;
                    }
                    Some(Err(err)) => {
                        warn!(target: "graph_rpc", ?err, "Undecodable fetch frame");
                        let err = NodeError::network(
                            "The graph server sent an invalid response",
                            err.to_string(),
                        );
                        yield FetchStep::Done(Some(err));
                        break;
                    }
                    None => {
                        let err = NodeError::network(
                            "The graph server closed the request, please try again shortly",
                            "subscription ended without a terminal frame",
                        );
                        yield FetchStep::Done(Some(err));
                        break;
                    }
                }
            }
        })
        .with_timeout(call_timeout)
    }
}

#[async_trait]
impl GraphFetcher for RemoteFetcher {
    fn fetch_address_timeline(&self, id: NodeId) -> FetchStream<GraphCursor> {
        self.relay(move |client| {
            Box::pin(async move { GraphApiClient::address_timeline(client.as_ref(), id).await })
        })
    }

    fn fetch_address_rels(
        &self,
        cursor: GraphCursor,
        include_address: bool,
    ) -> FetchStream<GraphObject> {
        self.relay(move |client| {
            Box::pin(async move {
                GraphApiClient::address_rels(client.as_ref(), cursor, include_address).await
            })
        })
    }

    fn fetch_block(&self, id: NodeId) -> FetchStream<GraphObject> {
        self.relay(move |client| {
            Box::pin(async move { GraphApiClient::block(client.as_ref(), id).await })
        })
    }

    fn fetch_transaction(&self, id: NodeId) -> FetchStream<GraphObject> {
        self.relay(move |client| {
            Box::pin(async move { GraphApiClient::transaction(client.as_ref(), id).await })
        })
    }

    async fn request_server_push(&self) -> Result<ChainState, NodeError> {
        let call = async {
            let client = self.inner.client().await?;
            GraphApiClient::request_server_push(client.as_ref()).await
        };
        match tokio::time::timeout(self.inner.config.call_timeout, call).await {
            Ok(Ok(state)) => Ok(state),
            Ok(Err(err)) => Err(node_error(&err)),
            Err(_) => Err(NodeError::network(
                "The request timed out, please try again shortly",
                "no chain state from the graph server",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpsee::types::ErrorObject;

    #[test]
    fn test_call_error_carries_node_error() {
        let sent = NodeError::not_exists("Block not found", "beyond head");
        let err = ClientError::Call(ErrorObject::owned(
            NODE_ERROR_CODE,
            sent.user_message.clone(),
            Some(sent.clone()),
        ));
        assert_eq!(node_error(&err), sent);

        let other = ClientError::Call(ErrorObject::owned(-32_000, "boom", None::<()>));
        assert!(node_error(&other).is_network());
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = RemoteFetcherConfig {
            connect_retries: 0,
            ..RemoteFetcherConfig::new(format!("ws://127.0.0.1:{port}"))
        };
        let err = RemoteFetcher::connect(config).await.unwrap_err();
        assert!(matches!(err, RpcError::Connect { .. }));
    }
}
