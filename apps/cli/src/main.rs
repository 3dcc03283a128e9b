//! Harvester CLI — ranked research document collection.
//!
//! Searches each topic, keeps the best candidates, fetches and converts
//! their content, and uploads the results to object storage.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
