//! Diagnostic accumulation and the top-level error taxonomy (spec.md §7).
//!
//! Mirrors the teacher's hand-rolled `CodeGenError` (`Display` + `Error` +
//! `From`) rather than reaching for a derive-macro error crate the teacher
//! itself doesn't use anywhere in this codebase.

use crate::mark::SourceMark;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One accumulated diagnostic. Categories 1-3 and 5-6 of spec.md §7 all
/// funnel through this type; category 4 (translator precondition) is a
/// fatal assertion and never becomes a `Diagnostic`.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub mark: Option<SourceMark>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.mark {
            Some(m) => write!(f, "{}: {}: {}", m, kind, self.message),
            None => write!(f, "{}: {}", kind, self.message),
        }
    }
}

/// Sink threaded through the preprocessor, parser, and typechecker.
/// Compilation of the current file is aborted at the nearest recovery
/// point after logging (next newline for the preprocessor, next
/// statement/declaration for the parser, whole file for the
/// typechecker/translator) — callers decide the recovery point; this
/// struct only accumulates.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    warnings_as_errors: bool,
}

impl Diagnostics {
    pub fn new(warnings_as_errors: bool) -> Self {
        Diagnostics {
            entries: Vec::new(),
            warnings_as_errors,
        }
    }

    pub fn error(&mut self, mark: Option<SourceMark>, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            mark,
        });
    }

    pub fn warn(&mut self, mark: Option<SourceMark>, message: impl Into<String>) {
        let severity = if self.warnings_as_errors {
            Severity::Error
        } else {
            Severity::Warning
        };
        self.entries.push(Diagnostic {
            severity,
            message: message.into(),
            mark,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Exit status per spec.md §7: non-zero if any error was logged (or
    /// any warning under `-Werror`, which `warn` already upgrades).
    pub fn exit_ok(&self) -> bool {
        !self.has_errors()
    }
}

/// Category 5/6 errors: I/O and driver failures that abort the whole
/// pipeline rather than accumulating, since there's no file left to
/// recover within.
#[derive(Debug)]
pub enum CompileError {
    Io { path: String, source: std::io::Error },
    ChildProcess { tool: String, status: Option<i32> },
    Cli(String),
    /// Accumulated diagnostics caused the pipeline to stop before linking.
    Diagnosed,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Io { path, source } => write!(f, "{}: {}", path, source),
            CompileError::ChildProcess { tool, status } => match status {
                Some(code) => write!(f, "{} exited with status {}", tool, code),
                None => write!(f, "{} terminated by signal", tool),
            },
            CompileError::Cli(s) => write!(f, "{}", s),
            CompileError::Diagnosed => write!(f, "compilation failed"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<(String, std::io::Error)> for CompileError {
    fn from((path, source): (String, std::io::Error)) -> Self {
        CompileError::Io { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_as_errors_upgrades_severity() {
        let mut d = Diagnostics::new(true);
        d.warn(None, "unused variable");
        assert!(d.has_errors());
        assert!(!d.exit_ok());
    }

    #[test]
    fn plain_warning_does_not_fail_build() {
        let mut d = Diagnostics::new(false);
        d.warn(None, "unused variable");
        assert!(!d.has_errors());
        assert!(d.exit_ok());
    }
}
