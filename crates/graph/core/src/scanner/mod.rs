//! Resumable scans over a table that continue with live updates.

mod error;
pub use error::ScannerError;

mod scan;
pub use scan::{ScanNotifier, Scanner};
