//! docmesh CLI: inspect and run the documentation transform pipeline.
//!
//! Aggregates Markdown from several repositories into one site by running
//! every document through an ordered, stage-based set of transformers.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
