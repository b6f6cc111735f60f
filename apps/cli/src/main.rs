//! contentpipe CLI: run one content pipeline job over a record store.
//!
//! Each invocation selects a job, fetches the records its filter matches,
//! and prints a summary of what happened to every record.

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
