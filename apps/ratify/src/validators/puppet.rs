//! Puppet manifest validators: parser syntax and style lint.

use crate::context::ContextKind;
use crate::error::UnparseableOutput;
use crate::models::{Event, Severity};
use crate::report::Report;
use crate::runner::ExecutionResult;
use crate::validate::{Check, ExternalCheck, InvokeOptions};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonVal;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const PUPPET_SYNTAX: &str = "puppet-syntax";
pub const PUPPET_LINT: &str = "puppet-lint";

const MANIFESTS: &str = "**/*.pp";

fn manifests_in_context(kind: ContextKind) -> bool {
    matches!(kind, ContextKind::Module | ContextKind::ControlRepo)
}

/// Map a path as printed by a tool back onto the target it came from.
///
/// An exact match wins; otherwise the longest target the path ends with.
fn match_target<'a>(reported: &str, targets: &'a [String]) -> Option<&'a str> {
    let reported = reported.trim().replace('\\', "/");
    if let Some(exact) = targets.iter().find(|t| reported == **t) {
        return Some(exact.as_str());
    }
    targets
        .iter()
        .filter(|t| reported.ends_with(&format!("/{}", t)))
        .max_by_key(|t| t.len())
        .map(String::as_str)
}

/// Event for one tool finding: warnings are reported without failing.
fn finding(source: &str, file: &str, message: String, severity: Severity) -> Event {
    match severity {
        Severity::Error => Event::failure(source, file, message),
        other => Event::warning(source, file, message).with_severity(other),
    }
}

/// `puppet parser validate` over every manifest in one batch.
pub struct PuppetSyntax;

fn syntax_line() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<severity>Error|Warning): (?P<message>.+?)(?: \(file: (?P<file>[^,]+), line: (?P<line>\d+), column: (?P<column>\d+)\))?\s*$",
        )
        .ok()
    })
    .as_ref()
}

impl Check for PuppetSyntax {
    fn name(&self) -> &str {
        PUPPET_SYNTAX
    }

    fn pattern(&self) -> Option<Vec<String>> {
        Some(vec![MANIFESTS.into()])
    }

    fn valid_in_context(&self, kind: ContextKind) -> bool {
        manifests_in_context(kind)
    }

    fn spinner_text(&self, targets: &[String]) -> String {
        format!("Checking Puppet manifest syntax ({} files)", targets.len())
    }
}

impl ExternalCheck for PuppetSyntax {
    fn command(&self) -> &str {
        "puppet"
    }

    fn uses_scratch_dir(&self) -> bool {
        true
    }

    fn environment(&self) -> Vec<(String, String)> {
        vec![("LANG".into(), "C".into()), ("LC_ALL".into(), "C".into())]
    }

    fn parse_options(&self, targets: &[String], opts: &InvokeOptions<'_>) -> Vec<String> {
        let mut args = vec!["parser".to_string(), "validate".to_string(), "--color=false".to_string()];
        if let Some(dir) = opts.scratch_dir {
            args.push("--vardir".to_string());
            args.push(dir.display().to_string());
        }
        args.extend(targets.iter().cloned());
        args
    }

    fn parse_output(
        &self,
        report: &Report,
        result: &ExecutionResult,
        targets: &[String],
    ) -> Result<(), UnparseableOutput> {
        let re = syntax_line().ok_or_else(|| UnparseableOutput::new(PUPPET_SYNTAX, "line pattern unavailable"))?;
        let matched: Vec<_> = result
            .stderr
            .lines()
            .chain(result.stdout.lines())
            .filter_map(|line| re.captures(line.trim_end()))
            .collect();
        // Unlocated lines after located diagnostics are usage trailers.
        let any_located = matched.iter().any(|c| c.name("file").is_some());
        let mut flagged: HashSet<String> = HashSet::new();
        for caps in matched.iter().filter(|c| !any_located || c.name("file").is_some()) {
            let severity = Severity::from_tool(&caps["severity"]);
            let file = caps
                .name("file")
                .map(|m| match_target(m.as_str(), targets).map_or_else(|| m.as_str().to_string(), String::from))
                .unwrap_or_else(|| ".".to_string());
            let line_no = caps.name("line").and_then(|m| m.as_str().parse().ok());
            let column = caps.name("column").and_then(|m| m.as_str().parse().ok());
            report.add_event(
                finding(PUPPET_SYNTAX, &file, caps["message"].to_string(), severity).with_location(line_no, column),
            );
            flagged.insert(file);
        }
        if result.exit_code != 0 && matched.is_empty() {
            return Err(UnparseableOutput::new(
                PUPPET_SYNTAX,
                format!("exit code {} with no recognisable diagnostics", result.exit_code),
            ));
        }
        for target in targets.iter().filter(|t| !flagged.contains(*t)) {
            report.add_event(Event::passed(PUPPET_SYNTAX, target));
        }
        Ok(())
    }
}

/// Style checks through `puppet-lint`, with `--fix` under auto-correct.
pub struct PuppetLint;

#[derive(Debug, Deserialize)]
struct LintProblem {
    message: String,
    #[serde(default)]
    line: Option<u64>,
    #[serde(default)]
    column: Option<u64>,
    kind: String,
    #[serde(default)]
    check: Option<String>,
    path: String,
}

/// puppet-lint prints either a flat array or one array per file.
fn flatten_problems(value: JsonVal, out: &mut Vec<JsonVal>) {
    match value {
        JsonVal::Array(items) => {
            for item in items {
                flatten_problems(item, out);
            }
        }
        other => out.push(other),
    }
}

impl Check for PuppetLint {
    fn name(&self) -> &str {
        PUPPET_LINT
    }

    fn pattern(&self) -> Option<Vec<String>> {
        Some(vec![MANIFESTS.into()])
    }

    fn valid_in_context(&self, kind: ContextKind) -> bool {
        manifests_in_context(kind)
    }

    fn spinner_text(&self, targets: &[String]) -> String {
        format!("Checking Puppet manifest style ({} files)", targets.len())
    }
}

impl ExternalCheck for PuppetLint {
    fn command(&self) -> &str {
        PUPPET_LINT
    }

    fn parse_options(&self, targets: &[String], opts: &InvokeOptions<'_>) -> Vec<String> {
        let mut args = vec!["--json".to_string(), "--relative".to_string()];
        if opts.auto_correct {
            args.push("--fix".to_string());
        }
        args.extend(targets.iter().cloned());
        args
    }

    fn parse_output(
        &self,
        report: &Report,
        result: &ExecutionResult,
        targets: &[String],
    ) -> Result<(), UnparseableOutput> {
        let stdout = result.stdout.trim();
        if stdout.is_empty() && result.exit_code != 0 {
            return Err(UnparseableOutput::new(PUPPET_LINT, "no output from a failed run"));
        }
        let mut raw = Vec::new();
        if !stdout.is_empty() {
            let value: JsonVal =
                serde_json::from_str(stdout).map_err(|e| UnparseableOutput::new(PUPPET_LINT, e.to_string()))?;
            flatten_problems(value, &mut raw);
        }

        // Decode the whole chunk before reporting any of it.
        let problems = raw
            .into_iter()
            .map(serde_json::from_value::<LintProblem>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| UnparseableOutput::new(PUPPET_LINT, e.to_string()))?;

        let mut flagged: HashSet<String> = HashSet::new();
        for problem in problems {
            let file = match_target(&problem.path, targets).map_or_else(|| problem.path.clone(), String::from);
            let ev = if problem.kind == "fixed" {
                Event::passed(PUPPET_LINT, &file).with_message(format!("Corrected: {}", problem.message))
            } else {
                flagged.insert(file.clone());
                finding(PUPPET_LINT, &file, problem.message, Severity::from_tool(&problem.kind))
            };
            let mut ev = ev.with_location(problem.line, problem.column);
            if let Some(check) = problem.check {
                ev = ev.with_test(check);
            }
            report.add_event(ev);
        }
        for target in targets.iter().filter(|t| !flagged.contains(*t)) {
            report.add_event(Event::passed(PUPPET_LINT, target));
        }
        Ok(())
    }
}
