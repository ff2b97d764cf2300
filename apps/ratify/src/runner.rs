//! Command execution boundary.
//!
//! The engine hands an `Invocation` to a `CommandRunner` and only looks at the
//! returned exit code and captured streams. `ProcessRunner` is the real
//! implementation; tests swap in scripted runners.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// One fully-resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            workdir: workdir.into(),
            env: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program file name, used for logging and install lookups.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecutionResult {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        ExecutionResult {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }
}

/// Executes one command synchronously and captures its output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult>;
}

/// Runs commands as child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        debug!(
            program = %invocation.program.display(),
            args = invocation.args.len(),
            workdir = %invocation.workdir.display(),
            "spawning command"
        );
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.workdir)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::CommandNotFound {
                    command: invocation.program_name(),
                },
                _ => Error::Io(e),
            })?;
        // Signals carry no exit code; they count as a plain failure.
        let exit_code = output.status.code().unwrap_or(1);
        debug!(program = %invocation.program_name(), exit_code, "command finished");
        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        })
    }
}

/// Locate `command`, preferring bundled bin directories over `PATH`.
pub fn resolve_command(command: &str, bundled: &[PathBuf], path_var: Option<OsString>) -> Result<PathBuf> {
    if Path::new(command).components().count() > 1 {
        let p = PathBuf::from(command);
        return if is_executable(&p) {
            Ok(p)
        } else {
            Err(Error::CommandNotFound {
                command: command.to_string(),
            })
        };
    }
    let from_path = path_var
        .as_ref()
        .map(|v| std::env::split_paths(v).collect::<Vec<_>>())
        .unwrap_or_default();
    for dir in bundled.iter().chain(from_path.iter()) {
        for name in candidate_names(command) {
            let candidate = dir.join(&name);
            if is_executable(&candidate) {
                debug!(command, resolved = %candidate.display(), "resolved command");
                return Ok(candidate);
            }
        }
    }
    Err(Error::CommandNotFound {
        command: command.to_string(),
    })
}

fn candidate_names(command: &str) -> Vec<String> {
    if cfg!(windows) {
        vec![
            format!("{}.exe", command),
            format!("{}.bat", command),
            format!("{}.cmd", command),
            command.to_string(),
        ]
    } else {
        vec![command.to_string()]
    }
}

#[cfg(unix)]
fn is_executable(p: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    p.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(p: &Path) -> bool {
    p.is_file()
}
