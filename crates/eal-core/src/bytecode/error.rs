//! Compile-time diagnostics

use std::fmt;

use thiserror::Error;

/// A compile diagnostic attached to a source line.
///
/// Diagnostics never abort compilation; the offending statement simply
/// produces no instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileDiagnostic {
    /// The kind of problem
    pub kind: CompileErrorKind,

    /// 1-based source line
    pub line: u32,

    /// Optional hint for fixing the problem
    pub hint: Option<String>,
}

impl CompileDiagnostic {
    /// Create a new diagnostic
    #[must_use]
    pub fn new(kind: CompileErrorKind, line: u32) -> Self {
        Self {
            kind,
            line,
            hint: None,
        }
    }

    /// Add a hint to the diagnostic
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for CompileDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileDiagnostic {}

/// The kind of compile diagnostic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileErrorKind {
    #[error("unrecognized line format: {0}")]
    UnrecognizedLine(String),

    #[error("invalid function name '{0}'")]
    InvalidFunctionName(String),

    #[error("function '{0}' cannot be declared inside another function")]
    NestedFunction(String),

    #[error("function '{0}' is missing its 'end'")]
    UnterminatedFunction(String),

    #[error("'end' without a matching 'declare function'")]
    StrayEnd,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_line_and_hint() {
        let diag = CompileDiagnostic::new(CompileErrorKind::UnrecognizedLine("??".to_string()), 4)
            .with_hint("statements look like '<mnemonic> <operands>'");
        let msg = diag.to_string();
        assert!(msg.starts_with("line 4: unrecognized line format: ??"));
        assert!(msg.contains("hint:"));
    }

    #[test]
    fn diagnostic_implements_std_error() {
        let diag = CompileDiagnostic::new(CompileErrorKind::StrayEnd, 1);
        let _: &dyn std::error::Error = &diag;
    }
}
