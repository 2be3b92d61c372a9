//! The pull protocol shared by every graph fetcher.

use crate::{ChainState, GraphCursor, GraphObject, NodeError, NodeId};
use async_trait::async_trait;
use futures::{Stream, StreamExt, stream::BoxStream};
use std::{fmt, sync::Arc, time::Duration};

/// One step of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStep<T> {
    /// A batch of results. More may follow.
    Yielded(Vec<T>),
    /// The fetch finished, successfully when the error is `None`.
    Done(Option<NodeError>),
}

/// A lazily evaluated fetch that ends with a typed terminal value.
///
/// Pulling past the terminal step keeps returning `Done(None)`.
pub struct FetchStream<T> {
    inner: Option<BoxStream<'static, FetchStep<T>>>,
}

impl<T: Send + 'static> FetchStream<T> {
    /// Wraps a stream of steps. A stream that ends without a `Done` step finishes successfully.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = FetchStep<T>> + Send + 'static,
    {
        Self { inner: Some(stream.boxed()) }
    }

    /// A fetch that finishes immediately with `result`.
    pub fn done(result: Option<NodeError>) -> Self {
        Self::new(futures::stream::iter([FetchStep::Done(result)]))
    }

    /// A fetch that fails immediately with `err`.
    pub fn failed(err: NodeError) -> Self {
        Self::done(Some(err))
    }

    /// Pulls the next step.
    pub async fn next(&mut self) -> FetchStep<T> {
        let Some(inner) = self.inner.as_mut() else {
            return FetchStep::Done(None);
        };
        match inner.next().await {
            Some(FetchStep::Yielded(batch)) => FetchStep::Yielded(batch),
            Some(FetchStep::Done(result)) => {
                self.inner = None;
                FetchStep::Done(result)
            }
            None => {
                self.inner = None;
                FetchStep::Done(None)
            }
        }
    }

    /// Returns true once the terminal step has been pulled.
    pub const fn is_finished(&self) -> bool {
        self.inner.is_none()
    }

    /// Bounds the wait for every step by `timeout`.
    ///
    /// A step that does not arrive in time ends the fetch with a network error.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let mut inner = self;
        Self::new(async_stream::stream! {
            loop {
                match tokio::time::timeout(timeout, inner.next()).await {
                    Ok(FetchStep::Yielded(batch)) => yield FetchStep::Yielded(batch),
                    Ok(done) => {
                        yield done;
                        break;
                    }
                    Err(_) => {
                        yield FetchStep::Done(Some(NodeError::network(
                            "The request timed out, please try again shortly",
                            format!("no response within {}ms", timeout.as_millis()),
                        )));
                        break;
                    }
                }
            }
        })
    }

    /// Drains the fetch, returning every yielded item and the terminal error.
    pub async fn collect_all(mut self) -> (Vec<T>, Option<NodeError>) {
        let mut items = Vec::new();
        loop {
            match self.next().await {
                FetchStep::Yielded(batch) => items.extend(batch),
                FetchStep::Done(result) => return (items, result),
            }
        }
    }
}

impl<T> fmt::Debug for FetchStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchStream").field("finished", &self.inner.is_none()).finish()
    }
}

/// Read side of the graph.
///
/// Every operation reports absence and failures through the terminal step of the returned
/// stream, never by panicking or through a separate error channel.
#[async_trait]
pub trait GraphFetcher: fmt::Debug + Send + Sync {
    /// Streams the page boundary cursors of a paginated entity in order.
    fn fetch_address_timeline(&self, id: NodeId) -> FetchStream<GraphCursor>;

    /// Streams the address (when `include_address` is set) and then its relations after
    /// `cursor`, never crossing into another entity's relations.
    fn fetch_address_rels(
        &self,
        cursor: GraphCursor,
        include_address: bool,
    ) -> FetchStream<GraphObject>;

    /// Streams a block and its directly incident relations.
    fn fetch_block(&self, id: NodeId) -> FetchStream<GraphObject>;

    /// Streams a transaction and its directly incident relations.
    fn fetch_transaction(&self, id: NodeId) -> FetchStream<GraphObject>;

    /// Returns the current chain head.
    async fn request_server_push(&self) -> Result<ChainState, NodeError>;
}

#[async_trait]
impl<F: GraphFetcher + ?Sized> GraphFetcher for Arc<F> {
    fn fetch_address_timeline(&self, id: NodeId) -> FetchStream<GraphCursor> {
        (**self).fetch_address_timeline(id)
    }

    fn fetch_address_rels(
        &self,
        cursor: GraphCursor,
        include_address: bool,
    ) -> FetchStream<GraphObject> {
        (**self).fetch_address_rels(cursor, include_address)
    }

    fn fetch_block(&self, id: NodeId) -> FetchStream<GraphObject> {
        (**self).fetch_block(id)
    }

    fn fetch_transaction(&self, id: NodeId) -> FetchStream<GraphObject> {
        (**self).fetch_transaction(id)
    }

    async fn request_server_push(&self) -> Result<ChainState, NodeError> {
        (**self).request_server_push().await
    }
}
