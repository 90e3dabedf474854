//! Toolchain diagnostics and their textual form.
//!
//! Diagnostics are rendered as
//!
//! ```text
//! <path>(<line>,<column>): <severity> <code>: <message>
//! ```
//!
//! with the location prefix dropped when the toolchain did not attach one.
//! The same format is parsed back by the parent process, which only sees
//! the compiler's stderr.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::host::SourceFile;

static DIAGNOSTIC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<file>.+?)(?:\((?P<line>\d+),(?P<column>\d+)\))?: )?(?P<severity>error|warning|message) (?P<code>\S+): (?P<message>.*)$",
    )
    .unwrap()
});

/// A toolchain-reported issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// File the diagnostic refers to, if any.
    pub file: Option<String>,
    /// 1-based line.
    pub line: Option<u32>,
    /// 1-based column.
    pub column: Option<u32>,
    pub severity: Severity,
    /// Toolchain-specific code, e.g. `TS2307`.
    pub code: String,
    pub message: String,
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Message,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Message => "message",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "message" => Some(Self::Message),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Diagnostic {
    /// Create a new error diagnostic without a location.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Create a new warning diagnostic without a location.
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn new(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: None,
            line: None,
            column: None,
            severity,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Attach a file without a position.
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach a file and the position of a byte offset within it.
    pub fn at(mut self, source: &SourceFile, offset: usize) -> Self {
        let (line, column) = source.line_and_column(offset);
        self.file = Some(source.path().to_string());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Parse a line produced by the `Display` implementation.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = DIAGNOSTIC_LINE.captures(line.trim_end())?;
        Some(Self {
            file: caps.name("file").map(|m| m.as_str().to_string()),
            line: caps.name("line").and_then(|m| m.as_str().parse().ok()),
            column: caps.name("column").and_then(|m| m.as_str().parse().ok()),
            severity: Severity::parse(&caps["severity"])?,
            code: caps["code"].to_string(),
            message: caps["message"].to_string(),
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(column)) => write!(f, "{file}({line},{column}): ")?,
            (Some(file), _, _) => write!(f, "{file}: ")?,
            _ => {}
        }
        write!(f, "{} {}: {}", self.severity, self.code, self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// The external channel diagnostics are reported to.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: &Diagnostic);
}

/// Writes each diagnostic as one line on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        eprintln!("{diagnostic}");
    }
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.push(diagnostic.clone());
    }
}

/// Render diagnostics one per line.
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
