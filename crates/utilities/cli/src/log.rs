//! Tracing subscriber setup.

use crate::{CliError, CliResult};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

/// Maps the number of `-v` flags to the default log level.
pub const fn verbosity_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Installs the global `fmt` subscriber.
///
/// Without an explicit `filter`, `RUST_LOG` directives apply on top of the level selected by
/// `verbosity`.
pub fn init_tracing_subscriber(verbosity: u8, filter: Option<EnvFilter>) -> CliResult<()> {
    let filter = filter.unwrap_or_else(|| {
        EnvFilter::builder()
            .with_default_directive(verbosity_level(verbosity).into())
            .from_env_lossy()
    });
    tracing_subscriber::fmt().with_env_filter(filter).try_init().map_err(CliError::Tracing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, LevelFilter::INFO)]
    #[case(1, LevelFilter::DEBUG)]
    #[case(2, LevelFilter::TRACE)]
    #[case(9, LevelFilter::TRACE)]
    fn test_verbosity_level(#[case] verbosity: u8, #[case] expected: LevelFilter) {
        assert_eq!(verbosity_level(verbosity), expected);
    }

    #[test]
    fn test_second_init_fails() {
        let filter = || Some(EnvFilter::new("warn"));
        let _ = init_tracing_subscriber(0, filter());
        assert!(matches!(init_tracing_subscriber(0, filter()), Err(CliError::Tracing(_))));
    }
}
