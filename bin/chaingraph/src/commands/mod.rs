//! Contains subcommands for chaingraph.

mod index;
pub use index::IndexCommand;

mod bridge;
pub use bridge::BridgeCommand;

mod edge;
pub use edge::EdgeCommand;
