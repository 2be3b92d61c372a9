//! Utilities shared by the chaingraph binaries: tracing and Prometheus setup, common flags and
//! error types.

pub mod backtrace;

mod error;
pub use error::{CliError, CliResult, PrometheusError};

mod log;
pub use log::{init_tracing_subscriber, verbosity_level};

mod metrics_args;
pub use metrics_args::MetricsArgs;

mod prometheus;
pub use prometheus::init_prometheus_server;
