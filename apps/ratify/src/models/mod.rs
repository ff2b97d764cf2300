//! Event model shared by validators, the report, and output sinks.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
/// Outcome of one check against one file.
pub enum State {
    #[default]
    Passed,
    Failure,
    Error,
    Skipped,
}

impl State {
    /// True for the states that fail a run.
    pub fn is_failing(self) -> bool {
        matches!(self, State::Failure | State::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Ok,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Map a tool-reported severity word onto the shared taxonomy.
    pub fn from_tool(word: &str) -> Severity {
        match word.trim().to_ascii_lowercase().as_str() {
            "error" | "err" | "fatal" => Severity::Error,
            "warning" | "warn" => Severity::Warning,
            "info" | "notice" | "convention" => Severity::Info,
            _ => Severity::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A single structured outcome. Never mutated once added to a report.
pub struct Event {
    pub file: String,
    pub source: String,
    pub state: State,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
}

impl Event {
    fn base(source: &str, file: &str, state: State, severity: Severity) -> Self {
        Event {
            file: file.to_string(),
            source: source.to_string(),
            state,
            severity,
            message: None,
            line: None,
            column: None,
            test: None,
        }
    }

    pub fn passed(source: &str, file: &str) -> Self {
        Self::base(source, file, State::Passed, Severity::Ok)
    }

    pub fn failure(source: &str, file: &str, message: impl Into<String>) -> Self {
        Self::base(source, file, State::Failure, Severity::Error).with_message(message)
    }

    pub fn error(source: &str, file: &str, message: impl Into<String>) -> Self {
        Self::base(source, file, State::Error, Severity::Error).with_message(message)
    }

    /// A finding worth reporting that does not fail the run.
    pub fn warning(source: &str, file: &str, message: impl Into<String>) -> Self {
        Self::base(source, file, State::Passed, Severity::Warning).with_message(message)
    }

    pub fn skipped(source: &str, file: &str, message: impl Into<String>) -> Self {
        Self::base(source, file, State::Skipped, Severity::Info).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_location(mut self, line: Option<u64>, column: Option<u64>) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }

    pub fn is_failing(&self) -> bool {
        self.state.is_failing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_without_empty_optionals() {
        let ev = Event::failure("puppet-lint", "manifests/init.pp", "bad quoting")
            .with_location(Some(3), None)
            .with_severity(Severity::Warning);
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["state"], "failure");
        assert_eq!(v["severity"], "warning");
        assert_eq!(v["line"], 3);
        assert!(v.get("column").is_none());
        assert!(v.get("test").is_none());
    }

    #[test]
    fn test_warning_keeps_severity_without_failing() {
        let ev = Event::warning("puppet-lint", "manifests/init.pp", "arrow alignment");
        assert_eq!(ev.state, State::Passed);
        assert_eq!(ev.severity, Severity::Warning);
        assert!(!ev.is_failing());
    }

    #[test]
    fn test_severity_from_tool_words() {
        assert_eq!(Severity::from_tool("Warning"), Severity::Warning);
        assert_eq!(Severity::from_tool("ERROR"), Severity::Error);
        assert_eq!(Severity::from_tool("notice"), Severity::Info);
        assert!(!State::Skipped.is_failing());
        assert!(State::Error.is_failing());
    }
}
