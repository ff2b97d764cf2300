//! Configuration discovery and effective settings resolution.
//!
//! Ratify reads `ratify.toml|yaml|yml` from the context root (or closest
//! ancestor) and merges it with CLI flags to produce an `Effective` config.
//! Defaults:
//! - `threads`: available parallelism
//! - `parallel`: false
//! - `batch_limit`: 1000
//! - `default_ignore`: true
//! - `bin_dirs`: `["bin"]`
//! - `formats`: `["text"]`
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `ratify.toml|yaml`.
pub struct RatifyConfig {
    pub threads: Option<usize>,
    pub parallel: Option<bool>,
    pub batch_limit: Option<usize>,
    pub default_ignore: Option<bool>,
    pub bin_dirs: Option<Vec<String>>,
    pub formats: Option<Vec<String>>,
    #[serde(default)]
    pub validators: Option<HashMap<String, ValidatorOverride>>, // [validators.<name>]
    #[serde(default)]
    pub install: Option<HashMap<String, Vec<String>>>, // [install].<command> = [argv]
}

#[derive(Debug, Default, Deserialize, Clone, PartialEq, Eq)]
/// Per-validator scope override.
pub struct ValidatorOverride {
    pub patterns: Option<Vec<String>>,
    pub ignore: Option<Vec<String>>,
}

/// Flags taken from the command line. `None` defers to the config file.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub repo_root: Option<String>,
    pub threads: Option<usize>,
    pub parallel: Option<bool>,
    pub auto_correct: bool,
    pub formats: Vec<String>,
}

#[derive(Debug, Clone)]
/// Fully-resolved settings used by a run after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub threads: usize,
    pub parallel: bool,
    pub auto_correct: bool,
    pub batch_limit: usize,
    pub default_ignore: bool,
    pub bin_dirs: Vec<PathBuf>,
    pub formats: Vec<String>,
    pub overrides: HashMap<String, ValidatorOverride>,
    pub install: HashMap<String, Vec<String>>,
}

impl Effective {
    /// Defaults rooted at `repo_root`, with no config file applied.
    pub fn defaults(repo_root: &Path) -> Self {
        Effective {
            repo_root: repo_root.to_path_buf(),
            threads: default_threads(),
            parallel: false,
            auto_correct: false,
            batch_limit: DEFAULT_BATCH_LIMIT,
            default_ignore: true,
            bin_dirs: vec![repo_root.join("bin")],
            formats: vec!["text".to_string()],
            overrides: HashMap::new(),
            install: HashMap::new(),
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Walk upward from `start` to detect the context root.
///
/// Stops at a `ratify.toml|yaml|yml`, a module `metadata.json`, or `.git`.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let start = fs::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
    let mut cur = start.as_path();
    loop {
        if ["ratify.toml", "ratify.yaml", "ratify.yml", "metadata.json", ".git"]
            .iter()
            .any(|marker| cur.join(marker).exists())
        {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.clone(),
        }
    }
}

/// Load `RatifyConfig` from `ratify.toml` or `ratify.yaml|yml` if present.
///
/// A present but unreadable or malformed file is a configuration error.
pub fn load_config(root: &Path) -> Result<Option<RatifyConfig>> {
    let toml_path = root.join("ratify.toml");
    if toml_path.exists() {
        let s = fs::read_to_string(&toml_path)?;
        let cfg: RatifyConfig = toml::from_str(&s)
            .map_err(|e| Error::Config(format!("{}: {}", toml_path.display(), e)))?;
        return Ok(Some(cfg));
    }
    for yml in ["ratify.yaml", "ratify.yml"] {
        let p = root.join(yml);
        if p.exists() {
            let s = fs::read_to_string(&p)?;
            let cfg: RatifyConfig = serde_yaml::from_str(&s)
                .map_err(|e| Error::Config(format!("{}: {}", p.display(), e)))?;
            return Ok(Some(cfg));
        }
    }
    Ok(None)
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli: &CliOverrides) -> Result<Effective> {
    let start = PathBuf::from(cli.repo_root.as_deref().unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let cfg = load_config(&repo_root)?.unwrap_or_default();
    let defaults = Effective::defaults(&repo_root);

    let threads = cli
        .threads
        .or(cfg.threads)
        .filter(|n| *n > 0)
        .unwrap_or(defaults.threads);
    let parallel = cli.parallel.or(cfg.parallel).unwrap_or(defaults.parallel);
    let batch_limit = cfg
        .batch_limit
        .filter(|n| *n > 0)
        .unwrap_or(defaults.batch_limit);
    let default_ignore = cfg.default_ignore.unwrap_or(defaults.default_ignore);

    // Relative bin dirs are anchored at the context root.
    let bin_dirs = match cfg.bin_dirs {
        Some(dirs) => dirs
            .into_iter()
            .map(|d| {
                let p = PathBuf::from(&d);
                if p.is_absolute() {
                    p
                } else {
                    repo_root.join(p)
                }
            })
            .collect(),
        None => defaults.bin_dirs,
    };

    let formats = if !cli.formats.is_empty() {
        cli.formats.clone()
    } else {
        cfg.formats.unwrap_or(defaults.formats)
    };

    Ok(Effective {
        repo_root,
        threads,
        parallel,
        auto_correct: cli.auto_correct,
        batch_limit,
        default_ignore,
        bin_dirs,
        formats,
        overrides: cfg.validators.unwrap_or_default(),
        install: cfg.install.unwrap_or_default(),
    })
}
