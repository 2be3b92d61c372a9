//! Prometheus flags.

use crate::{CliResult, init_prometheus_server};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr};

/// Flags of the Prometheus exporter.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct MetricsArgs {
    /// Port of the Prometheus endpoint. Metrics are not exported when unset.
    #[arg(long = "metrics.port", global = true, env = "CHAINGRAPH_METRICS_PORT")]
    pub port: Option<u16>,
    /// Address the Prometheus endpoint listens on.
    #[arg(
        long = "metrics.addr",
        global = true,
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        env = "CHAINGRAPH_METRICS_ADDR"
    )]
    pub addr: IpAddr,
}

impl Default for MetricsArgs {
    fn default() -> Self {
        Self { port: None, addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED) }
    }
}

impl MetricsArgs {
    /// Starts the Prometheus exporter if a port was given.
    pub fn init_metrics(&self) -> CliResult<()> {
        if let Some(port) = self.port {
            init_prometheus_server(self.addr, port)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_args() {
        let args = MetricsArgs::try_parse_from(["test"]).unwrap();
        assert_eq!(args, MetricsArgs::default());
        assert!(args.init_metrics().is_ok());

        let args =
            MetricsArgs::try_parse_from(["test", "--metrics.port", "9100", "--metrics.addr", "::1"])
                .unwrap();
        assert_eq!(args.port, Some(9100));
        assert_eq!(args.addr, "::1".parse::<IpAddr>().unwrap());
    }
}
