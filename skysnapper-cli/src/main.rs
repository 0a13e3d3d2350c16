//! Binary crate for the `skysnapper` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration and the terminal location prompt
//! - Human-friendly output formatting

use clap::Parser;

mod cli;
mod logger;
mod platform;
mod render;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    logger::init_cli_logger(cmd.verbose);
    cmd.run().await
}
