//! Progress spinners for interactive runs.
//!
//! Spinners are registered once per command descriptor (or per in-process
//! validator) and may hang under a parent spinner owned by a group. A group
//! spinner resolves to the aggregate outcome of its children.

use owo_colors::OwoColorize;
use std::io::{IsTerminal, Write};
use std::sync::{Mutex, PoisonError};

pub type SpinnerId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinnerEntry {
    pub id: SpinnerId,
    pub text: String,
    pub parent: Option<SpinnerId>,
    pub outcome: Option<bool>,
}

#[derive(Debug, Default)]
pub struct Progress {
    enabled: bool,
    render: bool,
    entries: Mutex<Vec<SpinnerEntry>>,
}

impl Progress {
    /// No spinners at all.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Spinners render to stderr when it is a terminal.
    pub fn detect() -> Self {
        let tty = std::io::stderr().is_terminal();
        Progress {
            enabled: tty,
            render: tty,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Track spinners without drawing them.
    pub fn recording() -> Self {
        Progress {
            enabled: true,
            render: false,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register a spinner; returns `None` when progress is disabled.
    pub fn register(&self, text: &str, parent: Option<SpinnerId>) -> Option<SpinnerId> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let id = entries.len();
        entries.push(SpinnerEntry {
            id,
            text: text.to_string(),
            parent,
            outcome: None,
        });
        Some(id)
    }

    pub fn start(&self, id: Option<SpinnerId>) {
        let Some(id) = id else { return };
        if let Some((text, depth)) = self.describe(id) {
            self.draw(&format!("{}{} {}", "  ".repeat(depth), "…".cyan(), text));
        }
    }

    pub fn finish(&self, id: Option<SpinnerId>, success: bool) {
        let Some(id) = id else { return };
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(e) = entries.get_mut(id) {
                e.outcome = Some(success);
            }
        }
        if let Some((text, depth)) = self.describe(id) {
            let icon = if success {
                "✔".green().to_string()
            } else {
                "✖".red().to_string()
            };
            self.draw(&format!("{}{} {}", "  ".repeat(depth), icon, text));
        }
    }

    pub fn entries(&self) -> Vec<SpinnerEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn children(&self, parent: SpinnerId) -> Vec<SpinnerEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.parent == Some(parent))
            .collect()
    }

    fn describe(&self, id: SpinnerId) -> Option<(String, usize)> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(id)?;
        let mut depth = 0;
        let mut cur = entry.parent;
        while let Some(p) = cur {
            depth += 1;
            cur = entries.get(p).and_then(|e| e.parent);
        }
        Some((entry.text.clone(), depth))
    }

    fn draw(&self, line: &str) {
        if self.render {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_progress_registers_nothing() {
        let p = Progress::disabled();
        assert_eq!(p.register("x", None), None);
        p.finish(None, true);
        assert!(p.entries().is_empty());
    }

    #[test]
    fn test_children_hang_under_parent_and_record_outcome() {
        let p = Progress::recording();
        let parent = p.register("Running puppet validators", None);
        let child = p.register("Checking Puppet manifest syntax", parent);
        p.finish(child, false);
        p.finish(parent, false);
        let kids = p.children(parent.unwrap());
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].outcome, Some(false));
    }
}
