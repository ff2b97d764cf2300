//! YAML syntax validation.

use crate::context::{ContextKind, RunContext};
use crate::models::Event;
use crate::report::Report;
use crate::validate::{Check, TargetCheck};
use serde::Deserialize;
use std::fs;

pub const YAML_SYNTAX: &str = "yaml-syntax";

pub struct YamlSyntax;

impl Check for YamlSyntax {
    fn name(&self) -> &str {
        YAML_SYNTAX
    }

    fn pattern(&self) -> Option<Vec<String>> {
        Some(vec!["**/*.yaml".into(), "**/*.yml".into()])
    }

    fn valid_in_context(&self, kind: ContextKind) -> bool {
        matches!(kind, ContextKind::Module | ContextKind::ControlRepo)
    }

    fn spinner_text(&self, targets: &[String]) -> String {
        format!("Checking YAML syntax ({} files)", targets.len())
    }
}

impl TargetCheck for YamlSyntax {
    fn validate_target(&self, report: &Report, ctx: &RunContext, target: &str) -> Option<i32> {
        let src = match fs::read_to_string(ctx.root.join(target)) {
            Ok(s) => s,
            Err(e) => {
                report.add_event(Event::error(YAML_SYNTAX, target, format!("Unable to read file: {}", e)));
                return Some(1);
            }
        };
        // Multi-document streams are valid; each document must parse.
        for doc in serde_yaml::Deserializer::from_str(&src) {
            if let Err(e) = serde_yaml::Value::deserialize(doc) {
                let loc = e.location();
                report.add_event(
                    Event::failure(YAML_SYNTAX, target, e.to_string()).with_location(
                        loc.as_ref().map(|l| l.line() as u64),
                        loc.as_ref().map(|l| l.column() as u64),
                    ),
                );
                return Some(1);
            }
        }
        report.add_event(Event::passed(YAML_SYNTAX, target));
        Some(0)
    }
}
