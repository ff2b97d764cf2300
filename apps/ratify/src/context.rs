//! Repository context and per-run shared state.
//!
//! A `RunContext` is built once per invocation of the tool and shared by
//! every validator instance. It owns the command runner, the spinner
//! registry, the worker pool, and the error channel that receives raw output
//! the engine could not interpret. It holds no per-validator state.

use crate::config::{Effective, ValidatorOverride};
use crate::error::{Error, Result, UnparseableOutput};
use crate::progress::Progress;
use crate::runner::{resolve_command, CommandRunner, ExecutionResult, Invocation};
use std::collections::HashSet;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Kind of repository the run is rooted in.
pub enum ContextKind {
    Module,
    ControlRepo,
    None,
}

impl ContextKind {
    pub fn detect(root: &Path) -> Self {
        if root.join("metadata.json").is_file() {
            ContextKind::Module
        } else if root.join("environment.conf").is_file() || root.join("Puppetfile").is_file() {
            ContextKind::ControlRepo
        } else {
            ContextKind::None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContextKind::Module => "module",
            ContextKind::ControlRepo => "control-repo",
            ContextKind::None => "none",
        }
    }
}

pub struct RunContext {
    pub root: PathBuf,
    pub kind: ContextKind,
    pub targets: Vec<String>,
    pub settings: Effective,
    runner: Arc<dyn CommandRunner>,
    progress: Progress,
    installed: Mutex<HashSet<String>>,
    error_channel: Mutex<Box<dyn Write + Send>>,
    pool: Option<rayon::ThreadPool>,
    path_var: Option<OsString>,
}

impl RunContext {
    /// Build the context; a worker pool is created only for parallel runs.
    pub fn new(settings: Effective, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let pool = if settings.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(settings.threads.max(1))
                .thread_name(|i| format!("ratify-worker-{}", i))
                .build()
                .map_err(|e| Error::Setup(format!("unable to start worker pool: {}", e)))?;
            Some(pool)
        } else {
            None
        };
        let root = settings.repo_root.clone();
        Ok(RunContext {
            kind: ContextKind::detect(&root),
            root,
            targets: Vec::new(),
            settings,
            runner,
            progress: Progress::disabled(),
            installed: Mutex::new(HashSet::new()),
            error_channel: Mutex::new(Box::new(std::io::stderr())),
            pool,
            path_var: std::env::var_os("PATH"),
        })
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_error_channel(mut self, channel: Box<dyn Write + Send>) -> Self {
        self.error_channel = Mutex::new(channel);
        self
    }

    /// Replace the `PATH` used for command lookup.
    pub fn with_path_var(mut self, path_var: Option<OsString>) -> Self {
        self.path_var = path_var;
        self
    }

    pub fn with_kind(mut self, kind: ContextKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn pool(&self) -> Option<&rayon::ThreadPool> {
        self.pool.as_ref()
    }

    pub fn override_for(&self, validator: &str) -> Option<&ValidatorOverride> {
        self.settings.overrides.get(validator)
    }

    pub fn resolve_command(&self, command: &str) -> Result<PathBuf> {
        resolve_command(command, &self.settings.bin_dirs, self.path_var.clone())
    }

    /// Run the configured install step for `command` once per run.
    pub fn ensure_installed(&self, command: &str) -> Result<()> {
        let mut done = self.installed.lock().unwrap_or_else(PoisonError::into_inner);
        if done.contains(command) {
            return Ok(());
        }
        if let Some(argv) = self.settings.install.get(command) {
            let (program, args) = argv
                .split_first()
                .ok_or_else(|| Error::Config(format!("empty install command for '{}'", command)))?;
            let inv = Invocation::new(self.resolve_command(program)?, &self.root).args(args.iter().cloned());
            info!(command, installer = %program, "running install step");
            let res = self.runner.run(&inv)?;
            if res.exit_code != 0 {
                return Err(Error::Setup(format!(
                    "install step for '{}' exited with {}: {}",
                    command,
                    res.exit_code,
                    res.stderr.trim()
                )));
            }
        }
        done.insert(command.to_string());
        Ok(())
    }

    /// Surface output that could not be parsed, verbatim.
    pub fn report_unparseable(&self, err: &UnparseableOutput, result: &ExecutionResult) {
        warn!(validator = %err.validator, reason = %err.reason, "unparseable output");
        let mut ch = self.error_channel.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(ch, "{}", err);
        if !result.stdout.is_empty() {
            let _ = ch.write_all(result.stdout.as_bytes());
            if !result.stdout.ends_with('\n') {
                let _ = writeln!(ch);
            }
        }
        if !result.stderr.is_empty() {
            let _ = ch.write_all(result.stderr.as_bytes());
            if !result.stderr.ends_with('\n') {
                let _ = writeln!(ch);
            }
        }
        let _ = ch.flush();
    }
}
