//! Ratify CLI binary entry point.
//! Resolves settings, runs the selected validators and renders the report.

use clap::Parser;
use ratify::cli::{Cli, Commands};
use ratify::config::{self, CliOverrides};
use ratify::context::RunContext;
use ratify::error::Result;
use ratify::output::{self, Sink};
use ratify::progress::Progress;
use ratify::report::Report;
use ratify::runner::ProcessRunner;
use ratify::utils::{error_prefix, note_prefix, relative_to};
use ratify::validate::ValidatorDef;
use ratify::validators;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit code for fatal errors that prevented validators from reporting.
const FATAL_EXIT: i32 = 2;

fn main() {
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::List => print_list(),
        Commands::Validate {
            args,
            repo_root,
            auto_correct,
            parallel,
            threads,
            formats,
            debug,
        } => {
            init_logging(debug);
            let overrides = CliOverrides {
                repo_root,
                threads,
                parallel: parallel.then_some(true),
                auto_correct,
                formats,
            };
            let code = match run_validate(&overrides, args) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("{} {}", error_prefix(), e);
                    FATAL_EXIT
                }
            };
            std::process::exit(code);
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_list() {
    for group in validators::groups() {
        println!("{}", group.name());
        for leaf in group.leaf_names() {
            println!("  {}", leaf);
        }
    }
}

/// Split positionals into an optional selector and the targets.
fn split_args(mut args: Vec<String>) -> (Option<String>, Vec<String>) {
    match args.first() {
        Some(first) if validators::is_selector(first) => {
            let selector = args.remove(0);
            (Some(selector), args)
        }
        _ => (None, args),
    }
}

/// Express command-line targets relative to the context root.
fn anchor_targets(root: &Path, cwd: &Path, raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|t| {
            let p = PathBuf::from(&t);
            let abs = if p.is_absolute() { p } else { cwd.join(p) };
            relative_to(root, &abs)
        })
        .collect()
}

fn run_validate(overrides: &CliOverrides, args: Vec<String>) -> Result<i32> {
    let eff = config::resolve_effective(overrides)?;
    if config::load_config(&eff.repo_root)?.is_none() {
        eprintln!("{} No ratify.toml found; using defaults.", note_prefix());
    }
    let sinks = eff
        .formats
        .iter()
        .map(|f| f.parse::<Sink>())
        .collect::<Result<Vec<_>>>()?;

    let (selector, raw_targets) = split_args(args);
    let cwd = std::env::current_dir()?;
    let targets = anchor_targets(&eff.repo_root, &cwd, raw_targets);

    let ctx = RunContext::new(eff, Arc::new(ProcessRunner))?
        .with_targets(targets)
        .with_progress(Progress::detect());
    let kind = ctx.kind;
    let def: Option<ValidatorDef> = match selector {
        Some(s) => validators::select(&s),
        None => Some(validators::all(kind)),
    };
    let Some(def) = def.filter(|d| d.valid_in_context(kind)) else {
        eprintln!(
            "{} No selected validators apply to a {} context.",
            note_prefix(),
            kind.as_str()
        );
        return Ok(0);
    };

    let ctx = Arc::new(ctx);
    let report = Report::new();
    let mut validator = def.build(&ctx);
    let code = validator.invoke(&report)?;
    output::write_sinks(&report, &sinks)?;
    info!(validator = %def.name(), exit = code, events = report.len(), "run finished");
    Ok(code)
}
