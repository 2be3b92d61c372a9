//! Enrichment jobs that scan the graph and attach derived data.

mod error;
pub use error::EnrichError;

mod forward;

mod code;
pub use code::CodeIndexer;

mod ens;
pub use ens::EnsIndexer;
