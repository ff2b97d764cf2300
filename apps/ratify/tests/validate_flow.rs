use ratify::config::Effective;
use ratify::context::{ContextKind, RunContext};
use ratify::error::Result;
use ratify::models::{Severity, State};
use ratify::output;
use ratify::report::Report;
use ratify::runner::{CommandRunner, ExecutionResult, Invocation};
use ratify::validators;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

type Script = dyn Fn(&Invocation) -> ExecutionResult + Send + Sync;

struct Scripted {
    script: Box<Script>,
    calls: Mutex<Vec<Invocation>>,
}

impl Scripted {
    fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&Invocation) -> ExecutionResult + Send + Sync + 'static,
    {
        Arc::new(Scripted {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn programs(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.program_name()).collect()
    }
}

impl CommandRunner for Scripted {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok((self.script)(invocation))
    }
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn write(root: &Path, rel: &str, body: &str) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, body).unwrap();
}

/// A small module with bundled tool stubs under `bin/`.
fn module(root: &Path) {
    write(root, "metadata.json", r#"{"name": "acme-ntp", "version": "1.0.0"}"#);
    write(root, "manifests/init.pp", "class ntp {}\n");
    write(root, "manifests/config.pp", "class ntp::config {}\n");
    write(root, "spec/fixtures/modules/stdlib/manifests/init.pp", "class stdlib {}\n");
    write(root, "data/common.yaml", "---\nntp::servers: []\n");
    write(root, "tasks/restart.json", r#"{"description": "Restart ntp"}"#);
    for tool in ["puppet", "puppet-lint", "metadata-json-lint"] {
        let p = root.join("bin").join(tool);
        write(root, &format!("bin/{}", tool), "#!/bin/sh\nexit 0\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&p, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }
}

fn context(root: &Path, runner: Arc<Scripted>, targets: Vec<String>, parallel: bool) -> RunContext {
    let mut settings = Effective::defaults(root);
    settings.parallel = parallel;
    settings.threads = 2;
    RunContext::new(settings, runner)
        .unwrap()
        .with_targets(targets)
        .with_path_var(None)
}

fn clean_tools(inv: &Invocation) -> ExecutionResult {
    match inv.program_name().as_str() {
        "metadata-json-lint" => ExecutionResult::new(r#"{"errors":[],"warnings":[]}"#, "", 0),
        "puppet-lint" => ExecutionResult::new("[]", "", 0),
        _ => ExecutionResult::new("", "", 0),
    }
}

#[test]
fn puppet_group_ignores_fixtures_and_reports_lint_warnings() {
    let dir = tempdir().unwrap();
    module(dir.path());
    let runner = Scripted::new(|inv| match inv.program_name().as_str() {
        "puppet-lint" => ExecutionResult::new(
            r#"[[{"message":"class not documented","line":1,"column":1,"kind":"warning","check":"documentation","path":"manifests/config.pp"}]]"#,
            "",
            0,
        ),
        _ => ExecutionResult::new("", "", 0),
    });
    let ctx = Arc::new(context(dir.path(), runner.clone(), vec![], false));
    assert_eq!(ctx.kind, ContextKind::Module);

    let report = Report::new();
    let mut group = validators::select("puppet").unwrap().build(&ctx);
    assert_eq!(group.invoke(&report).unwrap(), 0);
    assert!(!report.has_failures());
    assert_eq!(runner.programs(), vec!["puppet", "puppet-lint"]);

    let syntax = report.events_for("puppet-syntax");
    assert_eq!(syntax.len(), 2);
    assert!(syntax.iter().all(|e| !e.file.starts_with("spec/fixtures")));

    let lint = report.events_for("puppet-lint");
    let warning = lint.iter().find(|e| e.file == "manifests/config.pp").unwrap();
    assert_eq!(warning.state, State::Passed);
    assert_eq!(warning.severity, Severity::Warning);
    assert!(lint
        .iter()
        .any(|e| e.file == "manifests/init.pp" && e.state == State::Passed));
}

#[test]
fn lint_error_with_clean_exit_fails_the_run() {
    let dir = tempdir().unwrap();
    module(dir.path());
    let runner = Scripted::new(|inv| match inv.program_name().as_str() {
        "puppet-lint" => ExecutionResult::new(
            r#"[{"message":"ensure found on line but it's not the first attribute","line":3,"column":5,"kind":"error","check":"ensure_first_param","path":"manifests/init.pp"}]"#,
            "",
            0,
        ),
        _ => ExecutionResult::new("", "", 0),
    });
    let ctx = Arc::new(context(dir.path(), runner, vec![], false));
    let report = Report::new();
    let mut group = validators::select("puppet").unwrap().build(&ctx);
    assert_eq!(group.invoke(&report).unwrap(), 1);
    assert!(report.has_failures());
}

#[test]
fn non_json_output_is_surfaced_and_fails_the_run() {
    let dir = tempdir().unwrap();
    module(dir.path());
    let runner = Scripted::new(|inv| match inv.program_name().as_str() {
        "puppet-lint" => ExecutionResult::new("/usr/lib/ruby: warning: something odd", "", 0),
        _ => ExecutionResult::new("", "", 0),
    });
    let channel = Captured::default();
    let ctx = Arc::new(
        context(dir.path(), runner, vec![], false).with_error_channel(Box::new(channel.clone())),
    );
    let report = Report::new();
    let mut lint = validators::select("puppet-lint").unwrap().build(&ctx);
    let code = lint.invoke(&report).unwrap();
    assert_ne!(code, 0);
    assert!(report.events_for("puppet-lint").is_empty());
    let raw = String::from_utf8(channel.0.lock().unwrap().clone()).unwrap();
    assert!(raw.contains("/usr/lib/ruby: warning: something odd"));
}

#[test]
fn aggregate_run_over_a_clean_module_renders_every_source() {
    let dir = tempdir().unwrap();
    module(dir.path());
    let runner = Scripted::new(clean_tools);
    let ctx = Arc::new(context(dir.path(), runner.clone(), vec![], true));
    let report = Report::new();
    let mut all = validators::all(ctx.kind).build(&ctx);
    assert_eq!(all.invoke(&report).unwrap(), 0);
    assert!(!report.has_failures());
    assert_eq!(report.sources().len(), 7);

    let mut xml = Vec::new();
    output::write_junit(&report, &mut xml).unwrap();
    let xml = String::from_utf8(xml).unwrap();
    assert_eq!(xml.matches("<testsuite ").count(), 7);
    assert!(xml.contains("<testsuite name=\"yaml-syntax\" tests=\"1\" failures=\"0\""));
}

#[test]
fn explicit_targets_are_partitioned() {
    let dir = tempdir().unwrap();
    module(dir.path());
    let runner = Scripted::new(clean_tools);
    let targets = vec![
        "manifests/init.pp".to_string(),
        "metadata.json".to_string(),
        "manifests/missing.pp".to_string(),
    ];
    let ctx = Arc::new(context(dir.path(), runner.clone(), targets, false));
    let report = Report::new();
    let mut syntax = validators::select("puppet-syntax").unwrap().build(&ctx);
    assert_eq!(syntax.invoke(&report).unwrap(), 1);

    let events = report.events_for("puppet-syntax");
    let state_of = |file: &str| events.iter().find(|e| e.file == file).map(|e| e.state);
    assert_eq!(state_of("manifests/init.pp"), Some(State::Passed));
    assert_eq!(state_of("metadata.json"), Some(State::Skipped));
    assert_eq!(state_of("manifests/missing.pp"), Some(State::Error));

    let calls = runner.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args.last().map(String::as_str), Some("manifests/init.pp"));
}
