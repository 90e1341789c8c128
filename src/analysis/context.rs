use crate::analysis::diagnostic::{DiagnosticSeverity, DiagnosticSink};
use crate::analysis::symbol_table::{Symbol, SymbolTable};
use crate::parser::ast::{SourceSpan, SyntaxNode};

/// What a rule sees while one of its callbacks runs: the unit's symbols and a
/// reporting handle stamped with the rule's id and severity.
#[derive(Debug)]
pub struct VisitContext<'a> {
    symbols: &'a SymbolTable,
    sink: &'a mut DiagnosticSink,
    rule_id: &'static str,
    severity: DiagnosticSeverity,
}

impl<'a> VisitContext<'a> {
    pub fn new(
        symbols: &'a SymbolTable,
        sink: &'a mut DiagnosticSink,
        rule_id: &'static str,
        severity: DiagnosticSeverity,
    ) -> Self {
        Self {
            symbols,
            sink,
            rule_id,
            severity,
        }
    }

    /// True iff semantic resolution succeeded for the current unit
    pub fn has_semantic(&self) -> bool {
        self.symbols.has_semantic()
    }

    pub fn symbols(&self) -> &'a SymbolTable {
        self.symbols
    }

    /// Symbol of a declaration; `None` must be read as "skip", never as a violation
    pub fn symbol(&self, declaration: &SyntaxNode) -> Option<&'a Symbol> {
        self.symbols.resolve(declaration)
    }

    pub fn rule_id(&self) -> &'static str {
        self.rule_id
    }

    pub fn report_issue(&mut self, span: SourceSpan, message: impl Into<String>) {
        self.sink.report(self.rule_id, span, message, self.severity);
    }

    pub fn report_issue_on(&mut self, node: &SyntaxNode, message: impl Into<String>) {
        self.report_issue(node.span(), message);
    }
}
