//! Validators evaluated in-process, one target at a time.

use super::{effective_pattern, record_unrunnable, resolve_targets, Stage, TargetCheck};
use crate::context::RunContext;
use crate::error::Result;
use crate::models::Event;
use crate::progress::SpinnerId;
use crate::report::Report;
use crate::target::Resolution;
use std::sync::Arc;
use tracing::debug;

struct Prepared {
    resolution: Resolution,
    spinner: Option<SpinnerId>,
}

pub struct InProcessValidator {
    check: Box<dyn TargetCheck>,
    ctx: Arc<RunContext>,
    pub(crate) spinner_parent: Option<SpinnerId>,
    stage: Stage,
    prepared: Option<Prepared>,
}

impl InProcessValidator {
    pub fn new(check: Box<dyn TargetCheck>, ctx: Arc<RunContext>) -> Self {
        InProcessValidator {
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

    pub fn prepare_invoke(&mut self) -> Result<()> {
        if self.prepared.is_some() {
            return Ok(());
        }
        let resolution = resolve_targets(self.check.as_ref(), &self.ctx);
        let spinner = if resolution.valid.is_empty() && !self.check.allow_empty_targets() {
            None
        } else {
            self.ctx
                .progress()
                .register(&self.check.spinner_text(&resolution.valid), self.spinner_parent)
        };
        self.prepared = Some(Prepared { resolution, spinner });
        self.stage = Stage::Prepared;
        Ok(())
    }

    pub fn invoke(&mut self, report: &Report) -> Result<i32> {
        self.prepare_invoke()?;
        let pattern = self.pattern();
        let InProcessValidator {
            check,
            ctx,
            stage,
            prepared,
            ..
        } = self;
        let Some(prepared) = prepared.as_ref() else {
            return Ok(0);
        };
        let ctx: &RunContext = ctx;
        let name = check.name().to_string();
        report.touch(&name);
        *stage = Stage::Invoked;

        let mut exit = record_unrunnable(report, &name, pattern.as_deref(), &prepared.resolution);
        if prepared.resolution.valid.is_empty() && !check.allow_empty_targets() {
            *stage = Stage::Completed;
            return Ok(exit);
        }

        check.before_validation(ctx)?;
        let progress = ctx.progress();
        progress.start(prepared.spinner);
        for target in &prepared.resolution.valid {
            let failing_before = report.failing_count(&name);
            let code = match check.validate_target(report, ctx, target) {
                Some(code) if report.failing_count(&name) > failing_before => code.max(1),
                Some(code) => code,
                None => {
                    report.add_event(Event::failure(
                        &name,
                        target,
                        "Validation is not applicable to this target.",
                    ));
                    1
                }
            };
            exit = exit.max(code);
        }
        progress.finish(prepared.spinner, exit == 0);
        debug!(validator = %name, exit, targets = prepared.resolution.valid.len(), "in-process validator completed");
        *stage = Stage::Completed;
        Ok(exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::State;
    use crate::progress::Progress;
    use crate::validate::testing::{context_with, touch, FakeTargetCheck, ScriptedRunner};
    use tempfile::tempdir;

    #[test]
    fn test_validates_each_target_and_returns_max() {
        let dir = tempdir().unwrap();
        let targets = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ctx = context_with(dir.path(), ScriptedRunner::passing(), Progress::recording(), targets, |c| c);
        let check = FakeTargetCheck::new("fake-syntax", |t| Some(if t == "b" { 2 } else { 0 }));
        let before = Arc::clone(&check.before_calls);
        let mut v = InProcessValidator::new(Box::new(check), Arc::clone(&ctx));
        let report = Report::new();
        assert_eq!(v.invoke(&report).unwrap(), 2);
        assert_eq!(*before.lock().unwrap(), 1);
        assert_eq!(report.events_for("fake-syntax").len(), 3);
        // One indicator per validator, not per target.
        let spinners = ctx.progress().entries();
        assert_eq!(spinners.len(), 1);
        assert_eq!(spinners[0].outcome, Some(false));
    }

    #[test]
    fn test_not_applicable_maps_to_failure() {
        let dir = tempdir().unwrap();
        let ctx = context_with(dir.path(), ScriptedRunner::passing(), Progress::disabled(), vec!["x".into()], |c| c);
        let mut v = InProcessValidator::new(Box::new(FakeTargetCheck::new("fake", |_| None)), ctx);
        let report = Report::new();
        assert_eq!(v.invoke(&report).unwrap(), 1);
        let events = report.events_for("fake");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, State::Failure);
    }

    #[test]
    fn test_failing_event_raises_clean_target_result() {
        struct Lenient;
        impl crate::validate::Check for Lenient {
            fn name(&self) -> &str {
                "lenient"
            }
        }
        impl TargetCheck for Lenient {
            fn validate_target(&self, report: &Report, _ctx: &RunContext, target: &str) -> Option<i32> {
                report.add_event(Event::failure("lenient", target, "bad but exit 0"));
                Some(0)
            }
        }
        let dir = tempdir().unwrap();
        let ctx = context_with(dir.path(), ScriptedRunner::passing(), Progress::disabled(), vec!["x".into()], |c| c);
        let mut v = InProcessValidator::new(Box::new(Lenient), ctx);
        assert_eq!(v.invoke(&Report::new()).unwrap(), 1);
    }

    #[test]
    fn test_nothing_to_validate_skips_context_and_hook() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "README.md");
        let ctx = context_with(dir.path(), ScriptedRunner::passing(), Progress::disabled(), vec![], |c| c);
        let check = FakeTargetCheck::new("fake", |_| Some(0)).with_pattern("**/*.yaml");
        let before = Arc::clone(&check.before_calls);
        let mut v = InProcessValidator::new(Box::new(check), ctx);
        let report = Report::new();
        assert_eq!(v.invoke(&report).unwrap(), 0);
        assert_eq!(*before.lock().unwrap(), 0);
        let events = report.events_for("fake");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, State::Skipped);
        assert_eq!(events[0].file, ".");
    }
}
