use crate::{GraphActor, MetricsReporter, ServiceError};
use async_trait::async_trait;
use derive_more::Constructor;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Calls every [`MetricsReporter`] once per interval until cancelled.
#[derive(Debug, Constructor)]
pub struct MetricReporter {
    interval: Duration,
    reporters: Vec<Arc<dyn MetricsReporter>>,
    cancel_token: CancellationToken,
}

#[async_trait]
impl GraphActor for MetricReporter {
    type Error = ServiceError;

    async fn start(self) -> Result<(), Self::Error> {
        info!(
            target: "metric_reporter",
            interval = ?self.interval,
            reporters = self.reporters.len(),
            "Starting metric reporter",
        );
        loop {
            for reporter in &self.reporters {
                reporter.report_metrics();
            }
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!(
                        target: "metric_reporter",
                        "Metric reporter cancellation requested, stopping..."
                    );
                    return Ok(());
                }
                _ = sleep(self.interval) => {}
            }
        }
    }
}
