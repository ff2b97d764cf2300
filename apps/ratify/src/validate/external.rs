//! Validators that shell out to an external command.

use super::{effective_pattern, record_unrunnable, resolve_targets, ExternalCheck, InvokeOptions, InvokeStyle, Stage};
use crate::context::RunContext;
use crate::error::Result;
use crate::progress::SpinnerId;
use crate::report::Report;
use crate::runner::Invocation;
use crate::target::Resolution;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::debug;

/// One prepared execution unit and the exact targets it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub invocation: Invocation,
    pub targets: Vec<String>,
    pub spinner: Option<SpinnerId>,
}

struct Prepared {
    resolution: Resolution,
    descriptors: Vec<CommandDescriptor>,
    scratch: Option<TempDir>,
}

pub struct ExternalCommandValidator {
    check: Box<dyn ExternalCheck>,
    ctx: Arc<RunContext>,
    pub(crate) spinner_parent: Option<SpinnerId>,
    stage: Stage,
    prepared: Option<Prepared>,
}

impl ExternalCommandValidator {
    pub fn new(check: Box<dyn ExternalCheck>, ctx: Arc<RunContext>) -> Self {
        ExternalCommandValidator {
            check,
            ctx,
            spinner_parent: None,
            stage: Stage::Created,
            prepared: None,
        }
    }

    pub fn name(&self) -> &str {
        self.check.name()
    }

    pub fn pattern(&self) -> Option<Vec<String>> {
        effective_pattern(self.check.as_ref(), &self.ctx)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.prepared.as_ref().map(|p| &p.resolution)
    }

    pub fn descriptors(&self) -> &[CommandDescriptor] {
        self.prepared
            .as_ref()
            .map(|p| p.descriptors.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve targets and build descriptors. Later calls are no-ops.
    pub fn prepare_invoke(&mut self) -> Result<()> {
        if self.prepared.is_some() {
            return Ok(());
        }
        let check = self.check.as_ref();
        let ctx = self.ctx.as_ref();
        let resolution = resolve_targets(check, ctx);
        let runnable = !resolution.valid.is_empty() || check.allow_empty_targets();

        let mut scratch = None;
        let mut descriptors = Vec::new();
        if runnable {
            let program = ctx.resolve_command(check.command())?;
            if check.uses_scratch_dir() {
                scratch = Some(tempfile::Builder::new().prefix("ratify-").tempdir()?);
            }
            let opts = InvokeOptions {
                auto_correct: ctx.settings.auto_correct,
                scratch_dir: scratch.as_ref().map(|d: &TempDir| d.path()),
            };
            for chunk in chunk_targets(&resolution.valid, check.invoke_style(), ctx.settings.batch_limit) {
                let mut invocation =
                    Invocation::new(program.clone(), &ctx.root).args(check.parse_options(&chunk, &opts));
                invocation.env = check.environment();
                let spinner = ctx
                    .progress()
                    .register(&check.spinner_text(&chunk), self.spinner_parent);
                descriptors.push(CommandDescriptor {
                    invocation,
                    targets: chunk,
                    spinner,
                });
            }
        }
        debug!(
            validator = check.name(),
            valid = resolution.valid.len(),
            descriptors = descriptors.len(),
            "prepared external validator"
        );
        self.prepared = Some(Prepared {
            resolution,
            descriptors,
            scratch,
        });
        self.stage = Stage::Prepared;
        Ok(())
    }

    pub fn invoke(&mut self, report: &Report) -> Result<i32> {
        self.prepare_invoke()?;
        let pattern = self.pattern();
        let ExternalCommandValidator {
            check,
            ctx,
            stage,
            prepared,
            ..
        } = self;
        let Some(prepared) = prepared.as_mut() else {
            return Ok(0);
        };
        // Owned by this invocation; removed on every return path.
        let _scratch = prepared.scratch.take();
        let name = check.name().to_string();
        report.touch(&name);
        *stage = Stage::Invoked;

        let mut exit = record_unrunnable(report, &name, pattern.as_deref(), &prepared.resolution);
        if prepared.descriptors.is_empty() {
            *stage = Stage::Completed;
            return Ok(exit);
        }

        ctx.ensure_installed(check.command())?;
        let progress = ctx.progress();
        for desc in &prepared.descriptors {
            progress.start(desc.spinner);
            let result = match ctx.runner().run(&desc.invocation) {
                Ok(r) => r,
                Err(e) => {
                    progress.finish(desc.spinner, false);
                    return Err(e);
                }
            };
            let failing_before = report.failing_count(&name);
            let code = match check.parse_output(report, &result, &desc.targets) {
                // A failing event never comes with a clean exit.
                Ok(()) if report.failing_count(&name) > failing_before => result.exit_code.max(1),
                Ok(()) => result.exit_code,
                Err(err) => {
                    ctx.report_unparseable(&err, &result);
                    result.exit_code.max(1)
                }
            };
            progress.finish(desc.spinner, code == 0);
            exit = exit.max(code);
        }
        debug!(validator = %name, exit, "external validator completed");
        *stage = Stage::Completed;
        Ok(exit)
    }
}

/// Split targets into invocation-sized chunks.
///
/// An empty target list still yields one chunk so the tool can check the
/// context itself.
pub(crate) fn chunk_targets(targets: &[String], style: InvokeStyle, limit: usize) -> Vec<Vec<String>> {
    if targets.is_empty() {
        return vec![Vec::new()];
    }
    match style {
        InvokeStyle::Once => targets.chunks(limit.max(1)).map(|c| c.to_vec()).collect(),
        InvokeStyle::PerTarget => targets.iter().map(|t| vec![t.clone()]).collect(),
    }
}
