use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "drupdate",
    about = "Update a Drupal project's composer dependencies one package and one commit at a time",
    version,
    author
)]
pub struct Cli {
    /// Path to the project directory (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    pub path: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Defaults to `update` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Walk through outdated packages and commit each accepted update on a dated branch
    Update(UpdateArgs),

    /// List outdated direct dependencies without changing anything
    Check {
        /// Include require-dev packages
        #[arg(long)]
        include_dev: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Include require-dev packages
    #[arg(long)]
    pub include_dev: bool,

    /// Remote to offer pushing the update branch to (overrides drupdate.toml)
    #[arg(long, value_name = "NAME")]
    pub remote: Option<String>,

    /// Per-command timeout in seconds for git/composer, 0 for none (overrides drupdate.toml)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Answer every prompt with its default and accept every update
    #[arg(short, long)]
    pub yes: bool,
}
