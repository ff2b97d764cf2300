//! Built-in validator registry.
//!
//! Groups, in registry order:
//! - `metadata`: `metadata-syntax`, then `metadata-json-lint`
//! - `puppet`: `puppet-syntax`, then `puppet-lint`
//! - `tasks`: `task-name`, then `task-metadata-lint`
//! - `yaml`: `yaml-syntax`
//!
//! Members of a group run sequentially and stop at the first failure;
//! selections of several groups run as an aggregate.

pub mod metadata;
pub mod puppet;
pub mod tasks;
pub mod yaml;

use crate::context::ContextKind;
use crate::validate::{GroupPolicy, ValidatorDef};
use tracing::warn;

pub fn groups() -> Vec<ValidatorDef> {
    vec![
        ValidatorDef::group(
            "metadata",
            GroupPolicy::ShortCircuit,
            vec![
                ValidatorDef::in_process(|| Box::new(metadata::MetadataSyntax)),
                ValidatorDef::external(|| Box::new(metadata::MetadataJsonLint)),
            ],
        ),
        ValidatorDef::group(
            "puppet",
            GroupPolicy::ShortCircuit,
            vec![
                ValidatorDef::external(|| Box::new(puppet::PuppetSyntax)),
                ValidatorDef::external(|| Box::new(puppet::PuppetLint)),
            ],
        ),
        ValidatorDef::group(
            "tasks",
            GroupPolicy::ShortCircuit,
            vec![
                ValidatorDef::in_process(|| Box::new(tasks::TaskName)),
                ValidatorDef::in_process(|| Box::new(tasks::TaskMetadataLint)),
            ],
        ),
        ValidatorDef::group(
            "yaml",
            GroupPolicy::ShortCircuit,
            vec![ValidatorDef::in_process(|| Box::new(yaml::YamlSyntax))],
        ),
    ]
}

/// Every group valid in `kind`, as one aggregate.
pub fn all(kind: ContextKind) -> ValidatorDef {
    let members = groups()
        .into_iter()
        .filter(|g| g.valid_in_context(kind))
        .collect();
    ValidatorDef::group("all", GroupPolicy::Aggregate, members)
}

/// Look up a group or a single validator by name.
pub fn find(name: &str) -> Option<ValidatorDef> {
    fn walk(def: &ValidatorDef, name: &str) -> Option<ValidatorDef> {
        if def.name() == name {
            return Some(def.clone());
        }
        match def {
            ValidatorDef::Group(g) => g.members.iter().find_map(|m| walk(m, name)),
            _ => None,
        }
    }
    groups().iter().find_map(|g| walk(g, name))
}

/// True when any comma-separated token names a known validator or group.
pub fn is_selector(arg: &str) -> bool {
    arg.split(',').any(|t| find(t.trim()).is_some())
}

/// Resolve a comma-separated selector. Unknown names are warned and skipped.
pub fn select(selector: &str) -> Option<ValidatorDef> {
    let mut picked: Vec<ValidatorDef> = Vec::new();
    for token in selector.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match find(token) {
            Some(def) => {
                if !picked.iter().any(|p| p.name() == def.name()) {
                    picked.push(def);
                }
            }
            None => warn!(validator = token, "unknown validator, skipping"),
        }
    }
    match picked.len() {
        0 => None,
        1 => picked.pop(),
        _ => Some(ValidatorDef::group("selection", GroupPolicy::Aggregate, picked)),
    }
}
