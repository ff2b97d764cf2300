//! Task validators: naming rules and task metadata shape.

use super::metadata::json_error_message;
use crate::context::{ContextKind, RunContext};
use crate::models::{Event, Severity};
use crate::report::Report;
use crate::validate::{Check, TargetCheck};
use regex::Regex;
use serde_json::Value as JsonVal;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

pub const TASK_NAME: &str = "task-name";
pub const TASK_METADATA_LINT: &str = "task-metadata-lint";

const KNOWN_KEYS: &[&str] = &[
    "description",
    "parameters",
    "input_method",
    "puppet_task_version",
    "supports_noop",
    "implementations",
    "files",
    "private",
    "remote",
    "extensions",
];

fn name_rule() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").ok()).as_ref()
}

/// Task name of a file under `tasks/`: the file name up to its first dot.
fn task_name(target: &str) -> &str {
    let file = Path::new(target)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(target);
    file.split('.').next().unwrap_or(file)
}

pub struct TaskName;

impl Check for TaskName {
    fn name(&self) -> &str {
        TASK_NAME
    }

    fn pattern(&self) -> Option<Vec<String>> {
        Some(vec!["tasks/*".into()])
    }

    fn valid_in_context(&self, kind: ContextKind) -> bool {
        kind == ContextKind::Module
    }

    fn spinner_text(&self, _targets: &[String]) -> String {
        "Checking task names".to_string()
    }
}

impl TargetCheck for TaskName {
    fn validate_target(&self, report: &Report, _ctx: &RunContext, target: &str) -> Option<i32> {
        let name = task_name(target);
        let ok = name_rule().is_some_and(|re| re.is_match(name));
        if ok {
            report.add_event(Event::passed(TASK_NAME, target));
            Some(0)
        } else {
            report.add_event(Event::failure(
                TASK_NAME,
                target,
                format!(
                    "Invalid task name '{}'. Task names must start with a lowercase letter and can only contain lowercase letters, numbers, and underscores.",
                    name
                ),
            ));
            Some(1)
        }
    }
}

/// Shape checks for task metadata beyond JSON syntax.
pub struct TaskMetadataLint;

impl TaskMetadataLint {
    fn problems(doc: &JsonVal) -> Vec<(Severity, String)> {
        let Some(obj) = doc.as_object() else {
            return vec![(Severity::Error, "Task metadata must be a JSON object.".to_string())];
        };
        let mut out = Vec::new();
        for key in obj.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                out.push((Severity::Warning, format!("Unknown task metadata key '{}'.", key)));
            }
        }
        match obj.get("parameters") {
            None => {}
            Some(JsonVal::Object(params)) => {
                for (name, spec) in params {
                    if !spec.is_object() {
                        out.push((Severity::Error, format!("Parameter '{}' must be described by an object.", name)));
                    }
                }
            }
            Some(_) => out.push((Severity::Error, "'parameters' must be an object.".to_string())),
        }
        if let Some(noop) = obj.get("supports_noop") {
            if !noop.is_boolean() {
                out.push((Severity::Error, "'supports_noop' must be a boolean.".to_string()));
            }
        }
        out
    }
}

impl Check for TaskMetadataLint {
    fn name(&self) -> &str {
        TASK_METADATA_LINT
    }

    fn pattern(&self) -> Option<Vec<String>> {
        Some(vec!["tasks/*.json".into()])
    }

    fn valid_in_context(&self, kind: ContextKind) -> bool {
        kind == ContextKind::Module
    }
}

impl TargetCheck for TaskMetadataLint {
    fn validate_target(&self, report: &Report, ctx: &RunContext, target: &str) -> Option<i32> {
        let src = match fs::read_to_string(ctx.root.join(target)) {
            Ok(s) => s,
            Err(e) => {
                report.add_event(Event::error(TASK_METADATA_LINT, target, format!("Unable to read file: {}", e)));
                return Some(1);
            }
        };
        let doc: JsonVal = match serde_json::from_str(&src) {
            Ok(d) => d,
            Err(e) => {
                report.add_event(
                    Event::failure(TASK_METADATA_LINT, target, json_error_message(&e))
                        .with_location(Some(e.line() as u64), Some(e.column() as u64)),
                );
                return Some(1);
            }
        };
        let problems = Self::problems(&doc);
        if problems.is_empty() {
            report.add_event(Event::passed(TASK_METADATA_LINT, target));
            return Some(0);
        }
        let mut exit = 0;
        for (severity, message) in problems {
            let ev = match severity {
                Severity::Error => {
                    exit = 1;
                    Event::failure(TASK_METADATA_LINT, target, message)
                }
                other => Event::warning(TASK_METADATA_LINT, target, message).with_severity(other),
            };
            report.add_event(ev);
        }
        Some(exit)
    }
}
