//! Composite validators.
//!
//! `ShortCircuit` runs members in order and stops at the first non-zero
//! result. `Aggregate` runs every member and returns the maximum; with a
//! worker pool on the run context, members run on the pool concurrently.

use super::{Stage, Validator, ValidatorDef};
use crate::context::RunContext;
use crate::error::Result;
use crate::progress::SpinnerId;
use crate::report::Report;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupPolicy {
    ShortCircuit,
    Aggregate,
}

pub struct ValidatorGroup {
    name: String,
    policy: GroupPolicy,
    members: Vec<ValidatorDef>,
    ctx: Arc<RunContext>,
    pub(crate) spinner_parent: Option<SpinnerId>,
    spinner: Option<SpinnerId>,
    stage: Stage,
    instances: Option<Vec<Validator>>,
}

impl ValidatorGroup {
    pub fn new(name: &str, policy: GroupPolicy, members: Vec<ValidatorDef>, ctx: Arc<RunContext>) -> Self {
        ValidatorGroup {
            name: name.to_string(),
            policy,
            members,
            ctx,
            spinner_parent: None,
            spinner: None,
            stage: Stage::Created,
            instances: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> GroupPolicy {
        self.policy
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn spinner(&self) -> Option<SpinnerId> {
        self.spinner
    }

    /// One instance per member valid in the current context, built once.
    pub fn validator_instances(&mut self) -> &mut Vec<Validator> {
        let ctx = &self.ctx;
        let members = &self.members;
        self.instances.get_or_insert_with(|| {
            members
                .iter()
                .filter(|m| {
                    let ok = m.valid_in_context(ctx.kind);
                    if !ok {
                        debug!(validator = %m.name(), context = ctx.kind.as_str(), "not valid in context");
                    }
                    ok
                })
                .map(|m| m.build(ctx))
                .collect()
        })
    }

    /// Register the group spinner and hang every member under it.
    ///
    /// Members prepare themselves when invoked, so a member that never runs
    /// never resolves its command or registers a spinner.
    pub fn prepare_invoke(&mut self) -> Result<()> {
        if self.stage != Stage::Created {
            return Ok(());
        }
        let text = format!("Running {} validators", self.name);
        self.spinner = self.ctx.progress().register(&text, self.spinner_parent);
        let spinner = self.spinner;
        for child in self.validator_instances().iter_mut() {
            child.attach_spinner_parent(spinner);
        }
        self.stage = Stage::Prepared;
        Ok(())
    }

    pub fn invoke(&mut self, report: &Report) -> Result<i32> {
        self.prepare_invoke()?;
        self.stage = Stage::Invoked;
        let ctx = Arc::clone(&self.ctx);
        let policy = self.policy;
        let spinner = self.spinner;
        ctx.progress().start(spinner);

        let children = self.validator_instances();
        let outcome = match policy {
            GroupPolicy::ShortCircuit => run_short_circuit(children, report),
            GroupPolicy::Aggregate => match ctx.pool() {
                Some(pool) => {
                    let results: Vec<Result<i32>> =
                        pool.install(|| children.par_iter_mut().map(|c| c.invoke(report)).collect());
                    max_of(results)
                }
                None => max_of(children.iter_mut().map(|c| c.invoke(report)).collect()),
            },
        };

        ctx.progress().finish(spinner, matches!(outcome, Ok(0)));
        if let Ok(code) = outcome {
            info!(group = %self.name, exit = code, "validator group finished");
        }
        self.stage = Stage::Completed;
        outcome
    }
}

fn run_short_circuit(children: &mut [Validator], report: &Report) -> Result<i32> {
    for child in children.iter_mut() {
        let code = child.invoke(report)?;
        if code != 0 {
            debug!(validator = %child.name(), exit = code, "stopping group at first failure");
            return Ok(code);
        }
    }
    Ok(0)
}

/// Maximum exit code; the first fatal error wins once every member has run.
fn max_of(results: Vec<Result<i32>>) -> Result<i32> {
    let mut exit = 0;
    for r in results {
        exit = exit.max(r?);
    }
    Ok(exit)
}
