//! Module metadata validators.

use crate::context::{ContextKind, RunContext};
use crate::error::UnparseableOutput;
use crate::models::{Event, Severity};
use crate::report::Report;
use crate::runner::ExecutionResult;
use crate::validate::{Check, ExternalCheck, InvokeOptions, InvokeStyle, TargetCheck};
use serde::Deserialize;
use std::fs;

pub const METADATA_SYNTAX: &str = "metadata-syntax";
pub const METADATA_JSON_LINT: &str = "metadata-json-lint";

/// JSON well-formedness of `metadata.json` and task metadata files.
pub struct MetadataSyntax;

impl Check for MetadataSyntax {
    fn name(&self) -> &str {
        METADATA_SYNTAX
    }

    fn pattern(&self) -> Option<Vec<String>> {
        Some(vec!["metadata.json".into(), "tasks/*.json".into()])
    }

    fn valid_in_context(&self, kind: ContextKind) -> bool {
        kind == ContextKind::Module
    }

    fn spinner_text(&self, _targets: &[String]) -> String {
        "Checking metadata syntax".to_string()
    }
}

impl TargetCheck for MetadataSyntax {
    fn validate_target(&self, report: &Report, ctx: &RunContext, target: &str) -> Option<i32> {
        let src = match fs::read_to_string(ctx.root.join(target)) {
            Ok(s) => s,
            Err(e) => {
                report.add_event(Event::error(METADATA_SYNTAX, target, format!("Unable to read file: {}", e)));
                return Some(1);
            }
        };
        match serde_json::from_str::<serde_json::Value>(&src) {
            Ok(_) => {
                report.add_event(Event::passed(METADATA_SYNTAX, target));
                Some(0)
            }
            Err(e) => {
                report.add_event(
                    Event::failure(METADATA_SYNTAX, target, json_error_message(&e))
                        .with_location(Some(e.line() as u64), Some(e.column() as u64)),
                );
                Some(1)
            }
        }
    }
}

/// serde_json appends " at line L column C"; the location is reported separately.
pub(crate) fn json_error_message(e: &serde_json::Error) -> String {
    let full = e.to_string();
    match full.rfind(" at line ") {
        Some(idx) => full[..idx].to_string(),
        None => full,
    }
}

/// Style and dependency checks through the `metadata-json-lint` tool.
pub struct MetadataJsonLint;

#[derive(Debug, Default, Deserialize)]
struct LintOutput {
    #[serde(default)]
    errors: Vec<LintProblem>,
    #[serde(default)]
    warnings: Vec<LintProblem>,
}

#[derive(Debug, Deserialize)]
struct LintProblem {
    #[serde(default)]
    check: Option<String>,
    msg: String,
}

impl Check for MetadataJsonLint {
    fn name(&self) -> &str {
        METADATA_JSON_LINT
    }

    fn pattern(&self) -> Option<Vec<String>> {
        Some(vec!["metadata.json".into()])
    }

    fn valid_in_context(&self, kind: ContextKind) -> bool {
        kind == ContextKind::Module
    }

    fn spinner_text(&self, _targets: &[String]) -> String {
        "Checking module metadata style".to_string()
    }
}

impl ExternalCheck for MetadataJsonLint {
    fn command(&self) -> &str {
        METADATA_JSON_LINT
    }

    fn invoke_style(&self) -> InvokeStyle {
        InvokeStyle::PerTarget
    }

    fn parse_options(&self, targets: &[String], _opts: &InvokeOptions<'_>) -> Vec<String> {
        let mut args = vec!["--format".to_string(), "json".to_string()];
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
        let parsed: LintOutput = if stdout.is_empty() {
            if result.exit_code != 0 {
                return Err(UnparseableOutput::new(METADATA_JSON_LINT, "no output from a failed run"));
            }
            LintOutput::default()
        } else {
            serde_json::from_str(stdout).map_err(|e| UnparseableOutput::new(METADATA_JSON_LINT, e.to_string()))?
        };

        for target in targets {
            let problems = parsed
                .errors
                .iter()
                .map(|p| (p, Severity::Error))
                .chain(parsed.warnings.iter().map(|p| (p, Severity::Warning)));
            let mut clean = true;
            for (problem, severity) in problems {
                clean = false;
                let mut ev = match severity {
                    Severity::Error => Event::failure(METADATA_JSON_LINT, target, problem.msg.clone()),
                    _ => Event::warning(METADATA_JSON_LINT, target, problem.msg.clone()),
                };
                if let Some(check) = &problem.check {
                    ev = ev.with_test(check.clone());
                }
                report.add_event(ev);
            }
            if clean {
                report.add_event(Event::passed(METADATA_JSON_LINT, target));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::State;
    use crate::progress::Progress;
    use crate::validate::testing::{context_with, ScriptedRunner};
    use tempfile::tempdir;

    #[test]
    fn test_metadata_syntax_reports_location() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("metadata.json"), "{\n  \"name\": \"x\",\n}\n").unwrap();
        let ctx = context_with(dir.path(), ScriptedRunner::passing(), Progress::disabled(), vec![], |c| c);
        let report = Report::new();
        assert_eq!(MetadataSyntax.validate_target(&report, &ctx, "metadata.json"), Some(1));
        let events = report.events_for(METADATA_SYNTAX);
        assert_eq!(events[0].state, State::Failure);
        assert_eq!(events[0].line, Some(3));
        assert!(!events[0].message.as_deref().unwrap().contains(" at line "));
    }

    #[test]
    fn test_metadata_syntax_passes_valid_json() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("metadata.json"), r#"{"name": "acme-ntp"}"#).unwrap();
        let ctx = context_with(dir.path(), ScriptedRunner::passing(), Progress::disabled(), vec![], |c| c);
        let report = Report::new();
        assert_eq!(MetadataSyntax.validate_target(&report, &ctx, "metadata.json"), Some(0));
        assert_eq!(report.events_for(METADATA_SYNTAX)[0].state, State::Passed);
    }

    #[test]
    fn test_json_lint_maps_errors_and_warnings() {
        let report = Report::new();
        let out = r#"{"errors":[{"check":"license","msg":"License identifier x is not in the SPDX list"}],"warnings":[{"check":"dependencies","msg":"open ended dependency"}]}"#;
        let targets = vec!["metadata.json".to_string()];
        MetadataJsonLint
            .parse_output(&report, &ExecutionResult::new(out, "", 1), &targets)
            .unwrap();
        let events = report.events_for(METADATA_JSON_LINT);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].severity, Severity::Error);
        assert_eq!(events[0].test.as_deref(), Some("license"));
        assert_eq!(events[0].state, State::Failure);
        assert_eq!(events[1].severity, Severity::Warning);
        assert_eq!(events[1].state, State::Passed);
        assert_eq!(report.failing_count(METADATA_JSON_LINT), 1);
    }

    #[test]
    fn test_json_lint_clean_and_unparseable() {
        let report = Report::new();
        let targets = vec!["metadata.json".to_string()];
        MetadataJsonLint
            .parse_output(&report, &ExecutionResult::new("", "", 0), &targets)
            .unwrap();
        assert_eq!(report.events_for(METADATA_JSON_LINT)[0].state, State::Passed);

        let err = MetadataJsonLint
            .parse_output(&report, &ExecutionResult::new("Traceback: boom", "", 0), &targets)
            .unwrap_err();
        assert_eq!(err.validator, METADATA_JSON_LINT);
        assert_eq!(report.events_for(METADATA_JSON_LINT).len(), 1);
    }

    #[test]
    fn test_json_lint_args() {
        let opts = InvokeOptions {
            auto_correct: false,
            scratch_dir: None,
        };
        let args = MetadataJsonLint.parse_options(&["metadata.json".to_string()], &opts);
        assert_eq!(args, vec!["--format", "json", "metadata.json"]);
    }
}
