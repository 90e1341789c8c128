use std::fmt;

use crate::parser::ast::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => f.write_str("error"),
            DiagnosticSeverity::Warning => f.write_str("warning"),
            DiagnosticSeverity::Info => f.write_str("info"),
        }
    }
}

/// A finding reported by a rule. Immutable once reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub rule_id: String,
    pub span: SourceSpan,
    pub message: String,
    pub severity: DiagnosticSeverity,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}[{}]: {}",
            self.span, self.severity, self.rule_id, self.message
        )
    }
}

/// Collects diagnostics in report order for one pass
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    pub fn report(
        &mut self,
        rule_id: &str,
        span: SourceSpan,
        message: impl Into<String>,
        severity: DiagnosticSeverity,
    ) {
        self.diagnostics.push(Diagnostic {
            rule_id: rule_id.to_string(),
            span,
            message: message.into(),
            severity,
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Hands out everything reported so far, in report order, and leaves the sink empty
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
