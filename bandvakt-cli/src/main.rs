//! ## bandvakt-cli
//! **Command line frontend**
//! Live bandwidth monitoring, deterministic simulation and one-shot
//! device scans.

use clap::Parser;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run_command(cli).await
}
