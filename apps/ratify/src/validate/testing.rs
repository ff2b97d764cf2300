//! Test doubles shared by the validator tests.

use super::{Check, ExternalCheck, InvokeOptions, InvokeStyle, TargetCheck};
use crate::config::Effective;
use crate::context::{ContextKind, RunContext};
use crate::error::{Result, UnparseableOutput};
use crate::models::Event;
use crate::progress::Progress;
use crate::report::Report;
use crate::runner::{CommandRunner, ExecutionResult, Invocation};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

type Script = dyn Fn(&Invocation) -> ExecutionResult + Send + Sync;

/// Runner that answers from a closure and records every invocation.
#[derive(Clone)]
pub(crate) struct ScriptedRunner {
    script: Arc<Script>,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl ScriptedRunner {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Invocation) -> ExecutionResult + Send + Sync + 'static,
    {
        ScriptedRunner {
            script: Arc::new(script),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn passing() -> Self {
        Self::new(|_| ExecutionResult::default())
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::program_name).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok((self.script)(invocation))
    }
}

#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub(crate) fn touch(root: &Path, rel: &str) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, "").unwrap();
}

/// Place an executable stub under `<root>/bin` so command resolution succeeds.
pub(crate) fn fake_tool(root: &Path, name: &str) {
    let p = root.join("bin").join(name);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(&p, "#!/bin/sh\nexit 0\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&p, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

pub(crate) fn context_with<F>(
    root: &Path,
    runner: ScriptedRunner,
    progress: Progress,
    targets: Vec<String>,
    tweak: F,
) -> Arc<RunContext>
where
    F: FnOnce(RunContext) -> RunContext,
{
    let settings = Effective::defaults(root);
    let ctx = RunContext::new(settings, Arc::new(runner))
        .unwrap()
        .with_progress(progress)
        .with_targets(targets)
        .with_path_var(None);
    Arc::new(tweak(ctx))
}

pub(crate) fn parallel_context(root: &Path, runner: ScriptedRunner, threads: usize) -> Arc<RunContext> {
    let mut settings = Effective::defaults(root);
    settings.parallel = true;
    settings.threads = threads;
    let ctx = RunContext::new(settings, Arc::new(runner))
        .unwrap()
        .with_path_var(None);
    Arc::new(ctx)
}

/// Configurable external check. The command name equals the check name.
#[derive(Clone)]
pub(crate) struct FakeCheck {
    name: String,
    pattern: Option<Vec<String>>,
    style: InvokeStyle,
    allow_empty: bool,
    json: bool,
    scratch: bool,
    contexts: Option<Vec<ContextKind>>,
    failing: Vec<String>,
}

impl FakeCheck {
    pub fn new(name: &str) -> Self {
        FakeCheck {
            name: name.to_string(),
            pattern: None,
            style: InvokeStyle::Once,
            allow_empty: false,
            json: false,
            scratch: false,
            contexts: None,
            failing: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(vec![pattern.to_string()]);
        self
    }

    pub fn per_target(mut self) -> Self {
        self.style = InvokeStyle::PerTarget;
        self
    }

    pub fn allowing_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub fn expecting_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_scratch(mut self) -> Self {
        self.scratch = true;
        self
    }

    /// Report a failure for these targets even when the tool exits 0.
    pub fn failing_on(mut self, targets: &[&str]) -> Self {
        self.failing = targets.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn only_in(mut self, kinds: &[ContextKind]) -> Self {
        self.contexts = Some(kinds.to_vec());
        self
    }
}

impl Check for FakeCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn pattern(&self) -> Option<Vec<String>> {
        self.pattern.clone()
    }

    fn allow_empty_targets(&self) -> bool {
        self.allow_empty
    }

    fn valid_in_context(&self, kind: ContextKind) -> bool {
        self.contexts.as_ref().map_or(true, |k| k.contains(&kind))
    }
}

impl ExternalCheck for FakeCheck {
    fn command(&self) -> &str {
        &self.name
    }

    fn invoke_style(&self) -> InvokeStyle {
        self.style
    }

    fn uses_scratch_dir(&self) -> bool {
        self.scratch
    }

    fn parse_options(&self, targets: &[String], opts: &InvokeOptions<'_>) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(dir) = opts.scratch_dir {
            args.push(format!("--scratch={}", dir.display()));
        }
        args.extend(targets.iter().cloned());
        args
    }

    fn parse_output(
        &self,
        report: &Report,
        result: &ExecutionResult,
        targets: &[String],
    ) -> std::result::Result<(), UnparseableOutput> {
        if self.json {
            serde_json::from_str::<serde_json::Value>(&result.stdout)
                .map_err(|e| UnparseableOutput::new(&self.name, e.to_string()))?;
        }
        for t in targets {
            if result.exit_code == 0 && !self.failing.contains(t) {
                report.add_event(Event::passed(&self.name, t));
            } else {
                report.add_event(Event::failure(&self.name, t, "problem found"));
            }
        }
        Ok(())
    }
}

/// In-process check answering from a closure.
pub(crate) struct FakeTargetCheck {
    name: String,
    pattern: Option<Vec<String>>,
    answer: Arc<dyn Fn(&str) -> Option<i32> + Send + Sync>,
    pub before_calls: Arc<Mutex<usize>>,
}

impl FakeTargetCheck {
    pub fn new<F>(name: &str, answer: F) -> Self
    where
        F: Fn(&str) -> Option<i32> + Send + Sync + 'static,
    {
        FakeTargetCheck {
            name: name.to_string(),
            pattern: None,
            answer: Arc::new(answer),
            before_calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(vec![pattern.to_string()]);
        self
    }
}

impl Check for FakeTargetCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn pattern(&self) -> Option<Vec<String>> {
        self.pattern.clone()
    }
}

impl TargetCheck for FakeTargetCheck {
    fn before_validation(&self, _ctx: &RunContext) -> Result<()> {
        *self.before_calls.lock().unwrap() += 1;
        Ok(())
    }

    fn validate_target(&self, report: &Report, _ctx: &RunContext, target: &str) -> Option<i32> {
        let code = (self.answer)(target)?;
        if code == 0 {
            report.add_event(Event::passed(&self.name, target));
        } else {
            report.add_event(Event::failure(&self.name, target, "rejected"));
        }
        Some(code)
    }
}
