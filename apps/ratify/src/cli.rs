//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ratify",
    version,
    about = "Ratify: validate Puppet modules and control repos",
    long_about = "Ratify runs syntax and style validators over a Puppet module or control repo and reports one structured event per finding.\n\nConfiguration precedence: CLI > ratify.toml > defaults.",
    after_help = "Examples:\n  ratify validate\n  ratify validate puppet manifests/init.pp\n  ratify validate metadata,yaml --parallel --format junit:report.xml\n  ratify list",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current ratify version.")]
    Version,
    /// List validator groups and their members
    #[command(
        about = "List validators",
        long_about = "Print every validator group in registry order with its members."
    )]
    List,
    /// Run validators
    #[command(
        about = "Run validators",
        long_about = "Run the selected validators (all applicable ones by default) over the given targets. The first positional is treated as a selector when it names a known validator or group.",
        after_help = "Examples:\n  ratify validate\n  ratify validate puppet-lint --auto-correct\n  ratify validate manifests/ --format text --format json:out.json"
    )]
    Validate {
        /// Validator selector (comma-separated) followed by targets
        #[arg(value_name = "SELECTOR|TARGET")]
        args: Vec<String>,
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Let validators correct problems where supported")]
        auto_correct: bool,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Run validator groups concurrently")]
        parallel: bool,
        #[arg(long, help = "Worker threads for --parallel (default: available parallelism)")]
        threads: Option<usize>,
        #[arg(long = "format", value_name = "TYPE[:DEST]", help = "Output sink: text|junit|json, to stdout, stderr or a file (repeatable)")]
        formats: Vec<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Enable debug logging")]
        debug: bool,
    },
}
