//! Quadlet systemd generator
//!
//! Turns podman `.container` and `.volume` units into systemd services.

use clap::Parser;
use std::process;
use tracing::Level;

mod cli;
mod generate;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // stdout carries the generated units in dry-run mode
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = generate::execute(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
