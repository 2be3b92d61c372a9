//! JSON-RPC serving of graph fetchers.

mod server;
pub use server::GraphRpc;
