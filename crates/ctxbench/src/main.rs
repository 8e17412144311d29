mod bench;
mod cli;
mod compare;
mod config;
mod index;
mod inspect;
mod logging;
mod router;
mod run;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose || logging::env_flag();
    logging::init(verbose);
    match cli.command {
        Command::Bench {
            backend,
            queries,
            output,
            root,
        } => bench::run(backend, queries, output, root),
        Command::Compare {
            pattern_dir,
            semantic_dir,
            output,
            summary_out,
        } => compare::run(pattern_dir, semantic_dir, output, summary_out),
        Command::Index {
            root,
            tag,
            source,
            batch_size,
            batch_delay_ms,
            extensions,
            max_requests,
            interval_ms,
        } => index::run(
            root,
            tag,
            source,
            batch_size,
            batch_delay_ms,
            extensions,
            max_requests,
            interval_ms,
        ),
        Command::Inspect => inspect::run(),
        Command::Run { config } => run::run_from_config(&config),
    }
}
