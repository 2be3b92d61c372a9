//! CLI flags shared by every subcommand.

mod globals;
pub use globals::GlobalArgs;
