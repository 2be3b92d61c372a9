//! [`GraphApi`] mirrors the [`GraphFetcher`](chaingraph_types::GraphFetcher) operations.

use crate::FetchFrame;
use chaingraph_types::{ChainState, GraphCursor, GraphObject, NodeId};
use jsonrpsee::{
    core::{RpcResult, SubscriptionResult},
    proc_macros::rpc,
};

/// Every fetch is a subscription that sends [`FetchFrame::Batch`] frames and ends with exactly
/// one [`FetchFrame::Done`].
#[cfg_attr(not(feature = "client"), rpc(server, namespace = "graph"))]
#[cfg_attr(feature = "client", rpc(server, client, namespace = "graph"))]
pub trait GraphApi {
    /// Streams the page boundary cursors of an address.
    #[subscription(
        name = "subscribeAddressTimeline",
        item = FetchFrame<GraphCursor>,
        unsubscribe = "unsubscribeAddressTimeline"
    )]
    async fn address_timeline(&self, id: NodeId) -> SubscriptionResult;

    /// Streams one page of an address's relations after `cursor`.
    #[subscription(
        name = "subscribeAddressRels",
        item = FetchFrame<GraphObject>,
        unsubscribe = "unsubscribeAddressRels"
    )]
    async fn address_rels(
        &self,
        cursor: GraphCursor,
        include_address: bool,
    ) -> SubscriptionResult;

    /// Streams a block and its neighborhood.
    #[subscription(
        name = "subscribeBlock",
        item = FetchFrame<GraphObject>,
        unsubscribe = "unsubscribeBlock"
    )]
    async fn block(&self, id: NodeId) -> SubscriptionResult;

    /// Streams a transaction and its relations.
    #[subscription(
        name = "subscribeTransaction",
        item = FetchFrame<GraphObject>,
        unsubscribe = "unsubscribeTransaction"
    )]
    async fn transaction(&self, id: NodeId) -> SubscriptionResult;

    /// Returns the current chain state. Fetch failures are reported with [`NODE_ERROR_CODE`]
    /// and the [`NodeError`](chaingraph_types::NodeError) as error data.
    ///
    /// [`NODE_ERROR_CODE`]: crate::NODE_ERROR_CODE
    #[method(name = "requestServerPush")]
    async fn request_server_push(&self) -> RpcResult<ChainState>;
}
