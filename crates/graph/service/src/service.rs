use crate::{GraphActor, ServiceError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs a set of [`GraphActor`]s sharing one cancellation token.
///
/// The first actor to fail cancels the others. [`GraphService::run`] then waits for every actor
/// to wind down and returns that first error.
#[derive(Debug)]
pub struct GraphService {
    actors: JoinSet<(&'static str, Result<(), ServiceError>)>,
    cancel_token: CancellationToken,
}

impl GraphService {
    /// Creates an empty [`GraphService`] cancelling actors through `cancel_token`.
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self { actors: JoinSet::new(), cancel_token }
    }

    /// Spawns `actor` under `name`.
    pub fn spawn<A>(&mut self, name: &'static str, actor: A)
    where
        A: GraphActor<Error = ServiceError>,
    {
        self.actors.spawn(async move { (name, actor.start().await) });
    }

    /// Waits for every actor to stop.
    pub async fn run(mut self) -> Result<(), ServiceError> {
        let mut first_error = None;
        while let Some(joined) = self.actors.join_next().await {
            let failure = match joined {
                Ok((name, Ok(()))) => {
                    info!(target: "graph_service", name, "Actor stopped");
                    continue;
                }
                Ok((name, Err(err))) => {
                    error!(target: "graph_service", name, %err, "Actor failed");
                    err
                }
                Err(err) => {
                    error!(target: "graph_service", %err, "Actor task failed");
                    err.into()
                }
            };
            self.cancel_token.cancel();
            first_error.get_or_insert(failure);
        }
        first_error.map_or(Ok(()), Err)
    }
}
