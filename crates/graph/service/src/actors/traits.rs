//! [GraphActor] trait.

use async_trait::async_trait;

/// The [GraphActor] is a long running task of a chaingraph process.
///
/// Actors run until they are cancelled through their token or fail. An actor returning an error
/// makes the [`GraphService`](crate::GraphService) cancel its siblings.
#[async_trait]
pub trait GraphActor: Send + 'static {
    /// The error type for the actor.
    type Error: std::fmt::Debug;

    /// Runs the actor to completion.
    async fn start(self) -> Result<(), Self::Error>;
}
