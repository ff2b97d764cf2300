//! Target resolution.
//!
//! Expands user-supplied paths and the validator's glob patterns into three
//! disjoint lists relative to the context root:
//! - `valid`: run the check against these.
//! - `skipped`: in scope of the request but excluded, or nothing matched.
//! - `invalid`: explicitly requested but missing.
//!
//! Resolution never fails. Unreadable directories glob to nothing and bad
//! globs are logged and ignored.

use crate::utils::relative_to;
use glob::{MatchOptions, Pattern};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Ignored unless disabled: build output, vendored code, and fixtures.
pub const DEFAULT_IGNORE: &[&str] = &["/pkg/", "/vendor/", "/coverage/", "/spec/fixtures/modules/"];

const MATCH_OPTS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub valid: Vec<String>,
    pub skipped: Vec<String>,
    pub invalid: Vec<String>,
}

impl Resolution {
    fn push_unique(list: &mut Vec<String>, item: String) {
        if !list.contains(&item) {
            list.push(item);
        }
    }

    pub fn total(&self) -> usize {
        self.valid.len() + self.skipped.len() + self.invalid.len()
    }
}

/// Resolves targets for one validator against one context root.
pub struct TargetResolver {
    root: PathBuf,
    patterns: Option<Vec<String>>,
    ignore: Vec<Pattern>,
    allow_empty_targets: bool,
}

impl TargetResolver {
    pub fn new(root: &Path) -> Self {
        TargetResolver {
            root: canonical(root),
            patterns: None,
            ignore: Vec::new(),
            allow_empty_targets: false,
        }
    }

    /// Declared patterns. `None` means raw targets pass through untouched.
    pub fn patterns(mut self, patterns: Option<Vec<String>>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Extra gitignore-style exclusions.
    pub fn ignore<S: AsRef<str>>(mut self, ignore: &[S]) -> Self {
        for raw in ignore {
            if let Some(p) = compile_ignore(raw.as_ref()) {
                self.ignore.push(p);
            }
        }
        self
    }

    pub fn default_ignore(self, enabled: bool) -> Self {
        if enabled {
            self.ignore(DEFAULT_IGNORE)
        } else {
            self
        }
    }

    pub fn allow_empty_targets(mut self, allow: bool) -> Self {
        self.allow_empty_targets = allow;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, raw_targets: &[String]) -> Resolution {
        let mut res = Resolution::default();
        let Some(patterns) = self.patterns.as_ref() else {
            for t in raw_targets {
                Resolution::push_unique(&mut res.valid, t.clone());
            }
            self.skip_context_if_empty(&mut res, raw_targets);
            return res;
        };

        if raw_targets.is_empty() {
            let (kept, _) = self.glob_in(&self.root, patterns);
            res.valid = kept;
            self.skip_context_if_empty(&mut res, raw_targets);
            debug!(valid = res.valid.len(), "discovered targets under context root");
            return res;
        }

        for target in raw_targets {
            let path = {
                let p = Path::new(target);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    self.root.join(p)
                }
            };
            if path.is_dir() {
                let (kept, ignored) = self.glob_in(&canonical(&path), patterns);
                if kept.is_empty() {
                    Resolution::push_unique(&mut res.skipped, target.clone());
                    for rel in ignored {
                        Resolution::push_unique(&mut res.skipped, rel);
                    }
                } else {
                    for rel in kept {
                        Resolution::push_unique(&mut res.valid, rel);
                    }
                }
            } else if path.is_file() {
                let rel = relative_to(&self.root, &canonical(&path));
                if self.in_scope(&rel, patterns) {
                    Resolution::push_unique(&mut res.valid, rel);
                } else {
                    Resolution::push_unique(&mut res.skipped, target.clone());
                }
            } else {
                Resolution::push_unique(&mut res.invalid, target.clone());
            }
        }
        // A target may be reached both directly and through a directory.
        res.skipped.retain(|s| !res.valid.contains(s));
        debug!(
            valid = res.valid.len(),
            skipped = res.skipped.len(),
            invalid = res.invalid.len(),
            "resolved explicit targets"
        );
        res
    }

    fn skip_context_if_empty(&self, res: &mut Resolution, raw_targets: &[String]) {
        if raw_targets.is_empty() && res.valid.is_empty() && !self.allow_empty_targets {
            res.skipped.push(".".to_string());
        }
    }

    /// Glob every pattern under `dir`; returns (kept, ignored) root-relative files.
    fn glob_in(&self, dir: &Path, patterns: &[String]) -> (Vec<String>, Vec<String>) {
        let mut kept = Vec::new();
        let mut ignored = Vec::new();
        let base = Pattern::escape(&dir.to_string_lossy());
        for pat in patterns {
            let full = format!("{}/{}", base.trim_end_matches('/'), pat);
            let entries = match glob::glob_with(&full, MATCH_OPTS) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(pattern = %pat, error = %e, "invalid glob pattern");
                    continue;
                }
            };
            for path in entries.flatten() {
                if !path.is_file() {
                    continue;
                }
                let rel = relative_to(&self.root, &path);
                if self.is_ignored(&rel) {
                    Resolution::push_unique(&mut ignored, rel);
                } else {
                    Resolution::push_unique(&mut kept, rel);
                }
            }
        }
        (kept, ignored)
    }

    fn in_scope(&self, rel: &str, patterns: &[String]) -> bool {
        if rel.starts_with("../") || self.is_ignored(rel) {
            return false;
        }
        patterns.iter().any(|p| match Pattern::new(p) {
            Ok(pat) => pat.matches_with(rel, MATCH_OPTS),
            Err(_) => false,
        })
    }

    fn is_ignored(&self, rel: &str) -> bool {
        self.ignore.iter().any(|p| p.matches_with(rel, MATCH_OPTS))
    }
}

/// Translate a gitignore-style entry into a glob over root-relative paths.
fn compile_ignore(raw: &str) -> Option<Pattern> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let anchored = trimmed.starts_with('/');
    let mut body = trimmed.trim_start_matches('/').to_string();
    if body.ends_with('/') {
        body.push_str("**/*");
    }
    if !anchored && !body.contains('/') {
        body = format!("**/{}", body);
    }
    match Pattern::new(&body) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(pattern = %raw, error = %e, "invalid ignore pattern");
            None
        }
    }
}

fn canonical(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf())
}
