#![doc = "Address graph indexer and server for EVM chains."]

use clap::Parser;

mod cli;
mod commands;
mod flags;

fn main() {
    chaingraph_cli::backtrace::enable();
    if let Err(err) = cli::Cli::parse().run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
