//! bonusmap CLI: map loyalty-program merchants to their web domains.
//!
//! Fetches shop listings, resolves each merchant to a canonical domain, and
//! keeps a human-curated correction overlay in sync across runs.

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
