//! Validator framework.
//!
//! Every validator is one of three tagged variants behind the `Validator`
//! enum:
//! - `External`: shells out through the `CommandRunner`, batching targets.
//! - `InProcess`: evaluates each target without a subprocess.
//! - `Group`: an ordered composite of other validators, nestable.
//!
//! Concrete checks plug in through the `ExternalCheck` and `TargetCheck`
//! hook traits. Instances are built per run from `ValidatorDef` blueprints,
//! so no mutable state is shared between validators except the `Report`.
//!
//! Lifecycle: `Created -> Prepared -> Invoked -> Completed`.
//! `prepare_invoke` is idempotent: resolution, descriptor construction and
//! spinner registration happen once.

mod external;
mod group;
mod in_process;

pub use external::{CommandDescriptor, ExternalCommandValidator};
pub use group::{GroupPolicy, ValidatorGroup};
pub use in_process::InProcessValidator;

use crate::context::{ContextKind, RunContext};
use crate::error::{Result, UnparseableOutput};
use crate::models::Event;
use crate::progress::SpinnerId;
use crate::report::Report;
use crate::runner::ExecutionResult;
use crate::target::{Resolution, TargetResolver};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvokeStyle {
    /// Batch all targets, split by the configured limit.
    #[default]
    Once,
    /// One invocation per target.
    PerTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Created,
    Prepared,
    Invoked,
    Completed,
}

/// Properties every check declares.
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    /// Glob patterns relative to the context root. `None` passes targets through.
    fn pattern(&self) -> Option<Vec<String>> {
        None
    }

    fn pattern_ignore(&self) -> Vec<String> {
        Vec::new()
    }

    /// Run once against the context itself when no target matched.
    fn allow_empty_targets(&self) -> bool {
        false
    }

    fn valid_in_context(&self, _kind: ContextKind) -> bool {
        true
    }

    fn spinner_text(&self, targets: &[String]) -> String {
        match targets.len() {
            1 => format!("Running {} on {}", self.name(), targets[0]),
            n => format!("Running {} on {} files", self.name(), n),
        }
    }
}

/// Options handed to `ExternalCheck::parse_options`.
#[derive(Debug, Clone, Copy)]
pub struct InvokeOptions<'a> {
    pub auto_correct: bool,
    pub scratch_dir: Option<&'a Path>,
}

/// A check backed by an external command.
pub trait ExternalCheck: Check {
    /// Command name looked up in bundled bin dirs, then `PATH`.
    fn command(&self) -> &str;

    fn invoke_style(&self) -> InvokeStyle {
        InvokeStyle::Once
    }

    /// Request a private temporary directory for the duration of `invoke`.
    fn uses_scratch_dir(&self) -> bool {
        false
    }

    fn environment(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Arguments for one invocation covering exactly `targets`.
    fn parse_options(&self, targets: &[String], opts: &InvokeOptions<'_>) -> Vec<String>;

    /// Append events for exactly `targets` from one execution result.
    fn parse_output(
        &self,
        report: &Report,
        result: &ExecutionResult,
        targets: &[String],
    ) -> std::result::Result<(), UnparseableOutput>;
}

/// A check evaluated in-process, one target at a time.
pub trait TargetCheck: Check {
    fn before_validation(&self, _ctx: &RunContext) -> Result<()> {
        Ok(())
    }

    /// Validate one target, appending events. `None` means not applicable.
    fn validate_target(&self, report: &Report, ctx: &RunContext, target: &str) -> Option<i32>;
}

pub type ExternalFactory = Arc<dyn Fn() -> Box<dyn ExternalCheck> + Send + Sync>;
pub type TargetFactory = Arc<dyn Fn() -> Box<dyn TargetCheck> + Send + Sync>;

/// Blueprint from which per-run validator instances are built.
#[derive(Clone)]
pub enum ValidatorDef {
    External(ExternalFactory),
    InProcess(TargetFactory),
    Group(GroupDef),
}

#[derive(Clone)]
pub struct GroupDef {
    pub name: String,
    pub policy: GroupPolicy,
    pub members: Vec<ValidatorDef>,
}

impl ValidatorDef {
    pub fn external<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn ExternalCheck> + Send + Sync + 'static,
    {
        ValidatorDef::External(Arc::new(factory))
    }

    pub fn in_process<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn TargetCheck> + Send + Sync + 'static,
    {
        ValidatorDef::InProcess(Arc::new(factory))
    }

    pub fn group(name: &str, policy: GroupPolicy, members: Vec<ValidatorDef>) -> Self {
        ValidatorDef::Group(GroupDef {
            name: name.to_string(),
            policy,
            members,
        })
    }

    pub fn name(&self) -> String {
        match self {
            ValidatorDef::External(f) => f().name().to_string(),
            ValidatorDef::InProcess(f) => f().name().to_string(),
            ValidatorDef::Group(g) => g.name.clone(),
        }
    }

    /// Groups apply when any member does.
    pub fn valid_in_context(&self, kind: ContextKind) -> bool {
        match self {
            ValidatorDef::External(f) => f().valid_in_context(kind),
            ValidatorDef::InProcess(f) => f().valid_in_context(kind),
            ValidatorDef::Group(g) => g.members.iter().any(|m| m.valid_in_context(kind)),
        }
    }

    /// Names of the leaf validators reachable from this definition.
    pub fn leaf_names(&self) -> Vec<String> {
        match self {
            ValidatorDef::Group(g) => g.members.iter().flat_map(|m| m.leaf_names()).collect(),
            leaf => vec![leaf.name()],
        }
    }

    pub fn build(&self, ctx: &Arc<RunContext>) -> Validator {
        match self {
            ValidatorDef::External(f) => {
                Validator::External(ExternalCommandValidator::new(f(), Arc::clone(ctx)))
            }
            ValidatorDef::InProcess(f) => {
                Validator::InProcess(InProcessValidator::new(f(), Arc::clone(ctx)))
            }
            ValidatorDef::Group(g) => Validator::Group(ValidatorGroup::new(
                &g.name,
                g.policy,
                g.members.clone(),
                Arc::clone(ctx),
            )),
        }
    }
}

/// A per-run validator instance.
pub enum Validator {
    External(ExternalCommandValidator),
    InProcess(InProcessValidator),
    Group(ValidatorGroup),
}

impl Validator {
    pub fn name(&self) -> &str {
        match self {
            Validator::External(v) => v.name(),
            Validator::InProcess(v) => v.name(),
            Validator::Group(v) => v.name(),
        }
    }

    pub fn pattern(&self) -> Option<Vec<String>> {
        match self {
            Validator::External(v) => v.pattern(),
            Validator::InProcess(v) => v.pattern(),
            Validator::Group(_) => None,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Validator::External(v) => v.stage(),
            Validator::InProcess(v) => v.stage(),
            Validator::Group(v) => v.stage(),
        }
    }

    pub fn prepare_invoke(&mut self) -> Result<()> {
        match self {
            Validator::External(v) => v.prepare_invoke(),
            Validator::InProcess(v) => v.prepare_invoke(),
            Validator::Group(v) => v.prepare_invoke(),
        }
    }

    /// Run the validator; returns the maximum exit code it observed.
    pub fn invoke(&mut self, report: &Report) -> Result<i32> {
        match self {
            Validator::External(v) => v.invoke(report),
            Validator::InProcess(v) => v.invoke(report),
            Validator::Group(v) => v.invoke(report),
        }
    }

    pub(crate) fn attach_spinner_parent(&mut self, parent: Option<SpinnerId>) {
        match self {
            Validator::External(v) => v.spinner_parent = parent,
            Validator::InProcess(v) => v.spinner_parent = parent,
            Validator::Group(v) => v.spinner_parent = parent,
        }
    }
}

/// Effective pattern for a check after config overrides.
pub(crate) fn effective_pattern(check: &dyn Check, ctx: &RunContext) -> Option<Vec<String>> {
    ctx.override_for(check.name())
        .and_then(|o| o.patterns.clone())
        .or_else(|| check.pattern())
}

/// Resolve a check's targets against the run context.
pub(crate) fn resolve_targets(check: &dyn Check, ctx: &RunContext) -> Resolution {
    let mut ignore = check.pattern_ignore();
    if let Some(extra) = ctx.override_for(check.name()).and_then(|o| o.ignore.clone()) {
        ignore.extend(extra);
    }
    TargetResolver::new(&ctx.root)
        .patterns(effective_pattern(check, ctx))
        .ignore(&ignore)
        .default_ignore(ctx.settings.default_ignore)
        .allow_empty_targets(check.allow_empty_targets())
        .resolve(&ctx.targets)
}

/// Record skipped and invalid targets; returns the exit code they imply.
pub(crate) fn record_unrunnable(report: &Report, name: &str, pattern: Option<&[String]>, res: &Resolution) -> i32 {
    let scope = pattern
        .map(|p| p.join(", "))
        .unwrap_or_else(|| "any file".to_string());
    for target in &res.skipped {
        report.add_event(Event::skipped(
            name,
            target,
            format!("Target does not contain any files to validate ({}).", scope),
        ));
    }
    for target in &res.invalid {
        report.add_event(Event::error(name, target, "File does not exist."));
    }
    if res.invalid.is_empty() {
        0
    } else {
        1
    }
}

#[cfg(test)]
pub(crate) mod testing;
