//! Report rendering.
//!
//! Supports `text` (default), `junit`, and `json` sinks, each written to
//! stdout, stderr, or a file (`--format junit:report.xml`). All formats group
//! strictly by event source. A source that produced no events is still
//! rendered, as a single skipped entry.

use crate::error::{Error, Result};
use crate::models::{Event, Severity, State};
use crate::report::Report;
use owo_colors::OwoColorize;
use serde_json::{json, Map, Value as JsonVal};
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Junit,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    Stderr,
    File(PathBuf),
}

/// One `TYPE[:destination]` output request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sink {
    pub format: Format,
    pub destination: Destination,
}

impl FromStr for Sink {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, dest) = match s.split_once(':') {
            Some((k, d)) => (k, Some(d)),
            None => (s, None),
        };
        let format = match kind.trim().to_ascii_lowercase().as_str() {
            "text" => Format::Text,
            "junit" => Format::Junit,
            "json" => Format::Json,
            other => {
                return Err(Error::Config(format!(
                    "unknown output format '{}' (expected text, junit or json)",
                    other
                )))
            }
        };
        let destination = match dest.map(str::trim) {
            None | Some("") | Some("stdout") => Destination::Stdout,
            Some("stderr") => Destination::Stderr,
            Some(path) => Destination::File(PathBuf::from(path)),
        };
        Ok(Sink { format, destination })
    }
}

/// Render `report` to every sink. At most one sink may target each stream.
pub fn write_sinks(report: &Report, sinks: &[Sink]) -> Result<()> {
    for sink in sinks {
        match &sink.destination {
            Destination::Stdout => {
                let color = use_colors(sink.format) && io::stdout().is_terminal();
                render(report, sink.format, &mut io::stdout().lock(), color)?;
            }
            Destination::Stderr => {
                let color = use_colors(sink.format) && io::stderr().is_terminal();
                render(report, sink.format, &mut io::stderr().lock(), color)?;
            }
            Destination::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                let mut f = io::BufWriter::new(fs::File::create(path)?);
                render(report, sink.format, &mut f, false)?;
                f.flush()?;
            }
        }
    }
    Ok(())
}

fn use_colors(format: Format) -> bool {
    format == Format::Text && std::env::var_os("NO_COLOR").is_none()
}

fn render<W: Write>(report: &Report, format: Format, w: &mut W, color: bool) -> io::Result<()> {
    match format {
        Format::Text => write_text(report, w, color),
        Format::Junit => write_junit(report, w),
        Format::Json => write_json(report, w),
    }
}

/// Human-readable listing of every non-passing or noteworthy event plus a summary line.
pub fn write_text<W: Write>(report: &Report, w: &mut W, color: bool) -> io::Result<()> {
    let sources = report.sources();
    let mut counts = Counts::default();
    for (source, events) in &sources {
        if events.is_empty() {
            counts.skipped += 1;
            continue;
        }
        for ev in events {
            counts.add(ev);
            if ev.state == State::Passed && ev.severity == Severity::Ok {
                continue;
            }
            let (icon, tag) = label(ev);
            let location = location(ev);
            let message = ev.message.as_deref().unwrap_or("");
            if color {
                let icon = match ev.state {
                    State::Skipped => icon.blue().to_string(),
                    _ if ev.severity == Severity::Warning => icon.yellow().to_string(),
                    _ => icon.red().to_string(),
                };
                writeln!(
                    w,
                    "{} {} {} ❲{}❳ — {}",
                    icon,
                    tag.bold(),
                    location.bold(),
                    source,
                    message
                )?;
            } else {
                writeln!(w, "{} {} {} ❲{}❳ — {}", icon, tag, location, source, message)?;
            }
        }
    }
    let summary = format!(
        "— Summary — passed={} failures={} skipped={} sources={}",
        counts.passed,
        counts.failing,
        counts.skipped,
        sources.len()
    );
    if color {
        writeln!(w, "{}", summary.bold())
    } else {
        writeln!(w, "{}", summary)
    }
}

#[derive(Default)]
struct Counts {
    passed: usize,
    failing: usize,
    skipped: usize,
}

impl Counts {
    fn add(&mut self, ev: &Event) {
        match ev.state {
            State::Passed => self.passed += 1,
            State::Failure | State::Error => self.failing += 1,
            State::Skipped => self.skipped += 1,
        }
    }
}

fn label(ev: &Event) -> (&'static str, String) {
    match ev.state {
        State::Skipped => ("◆", "⟦skipped⟧".to_string()),
        State::Passed if ev.severity == Severity::Ok => ("✔", "⟦ok⟧".to_string()),
        State::Passed => ("▲", format!("⟦{}⟧", ev.severity.as_str())),
        State::Failure | State::Error => {
            let icon = if ev.severity == Severity::Warning { "▲" } else { "✖" };
            (icon, format!("⟦{}⟧", ev.severity.as_str()))
        }
    }
}

fn location(ev: &Event) -> String {
    match (ev.line, ev.column) {
        (Some(l), Some(c)) => format!("{}:{}:{}", ev.file, l, c),
        (Some(l), None) => format!("{}:{}", ev.file, l),
        _ => ev.file.clone(),
    }
}

/// JUnit XML: one testsuite per source.
pub fn write_junit<W: Write>(report: &Report, w: &mut W) -> io::Result<()> {
    let sources = report.sources();
    let total: usize = sources.iter().map(|(_, e)| e.len().max(1)).sum();
    let failing: usize = sources
        .iter()
        .map(|(_, e)| e.iter().filter(|ev| ev.is_failing()).count())
        .sum();
    writeln!(w, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(w, "<testsuites tests=\"{}\" failures=\"{}\">", total, failing)?;
    for (source, events) in &sources {
        let src = escape_xml(source);
        if events.is_empty() {
            writeln!(
                w,
                "  <testsuite name=\"{}\" tests=\"1\" failures=\"0\" errors=\"0\" skipped=\"1\">",
                src
            )?;
            writeln!(w, "    <testcase name=\"{}\" classname=\"{}\">", src, src)?;
            writeln!(w, "      <skipped message=\"No targets were validated\" />")?;
            writeln!(w, "    </testcase>")?;
            writeln!(w, "  </testsuite>")?;
            continue;
        }
        let failures = events.iter().filter(|e| e.is_failing()).count();
        let skipped = events.iter().filter(|e| e.state == State::Skipped).count();
        writeln!(
            w,
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"0\" skipped=\"{}\">",
            src,
            events.len(),
            failures,
            skipped
        )?;
        for ev in events {
            let classname = match &ev.test {
                Some(t) => format!("{}.{}", source, t),
                None => source.clone(),
            };
            write!(
                w,
                "    <testcase name=\"{}\" classname=\"{}\"",
                escape_xml(&location(ev)),
                escape_xml(&classname)
            )?;
            let message = ev.message.as_deref().unwrap_or("");
            match ev.state {
                State::Passed => writeln!(w, " />")?,
                State::Skipped => {
                    writeln!(w, ">")?;
                    writeln!(w, "      <skipped message=\"{}\" />", escape_xml(message))?;
                    writeln!(w, "    </testcase>")?;
                }
                State::Failure | State::Error => {
                    writeln!(w, ">")?;
                    writeln!(
                        w,
                        "      <failure type=\"{}\" message=\"{}\">{}: {}</failure>",
                        ev.severity.as_str(),
                        escape_xml(message),
                        escape_xml(&location(ev)),
                        escape_xml(message)
                    )?;
                    writeln!(w, "    </testcase>")?;
                }
            }
        }
        writeln!(w, "  </testsuite>")?;
    }
    writeln!(w, "</testsuites>")
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

pub fn write_json<W: Write>(report: &Report, w: &mut W) -> io::Result<()> {
    let out = compose_json(report);
    serde_json::to_writer_pretty(&mut *w, &out).map_err(io::Error::from)?;
    writeln!(w)
}

/// Compose the JSON document (pure) keyed by source in insertion order.
pub fn compose_json(report: &Report) -> JsonVal {
    let mut by_source = Map::new();
    for (source, events) in report.sources() {
        let items = if events.is_empty() {
            vec![json!({
                "file": ".",
                "source": source,
                "state": "skipped",
                "severity": "info",
                "message": "No targets were validated",
            })]
        } else {
            events
                .iter()
                .map(|e| serde_json::to_value(e).unwrap_or(JsonVal::Null))
                .collect()
        };
        by_source.insert(source, JsonVal::Array(items));
    }
    JsonVal::Object(by_source)
}
