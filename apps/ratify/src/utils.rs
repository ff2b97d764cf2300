//! Supporting helpers: colored diagnostic prefixes and path normalisation.

use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::{Component, Path};

/// Whether stderr diagnostics should be colorized.
pub fn use_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal()
}

pub fn error_prefix() -> String {
    if use_colors() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

pub fn note_prefix() -> String {
    if use_colors() {
        "note:".cyan().bold().to_string()
    } else {
        "note:".to_string()
    }
}

/// Render a path with forward slashes and without `.` components.
pub fn slash_path(p: &Path) -> String {
    let mut absolute = false;
    let mut parts: Vec<String> = Vec::new();
    for comp in p.components() {
        match comp {
            Component::CurDir => {}
            Component::RootDir => absolute = true,
            other => parts.push(other.as_os_str().to_string_lossy().into_owned()),
        }
    }
    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Path of `target` relative to `root`, slash-separated.
///
/// Both sides should already be canonicalized by the caller.
pub fn relative_to(root: &Path, target: &Path) -> String {
    match pathdiff::diff_paths(target, root) {
        Some(rel) => slash_path(&rel),
        None => slash_path(target),
    }
}
