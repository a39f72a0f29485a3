mod agents;
mod cli;
mod config;
mod error;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command.unwrap_or_else(|| Commands::Update(Default::default())) {
        Commands::Update(args) => workflow::execute_update(&cli.path, args),
        Commands::Check { include_dev } => workflow::execute_check(&cli.path, include_dev),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose { "drupdate=debug" } else { "warn" }
}

/// Diagnostics and run warnings go to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_shown_by_default() {
        assert_eq!(default_filter(false), "warn");
        assert_eq!(default_filter(true), "drupdate=debug");
    }
}
