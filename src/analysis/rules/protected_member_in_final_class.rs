use crate::analysis::context::VisitContext;
use crate::analysis::diagnostic::DiagnosticSeverity;
use crate::analysis::rule::{RuleError, SemanticRule};
use crate::analysis::symbol_table::Overriding;
use crate::parser::ast::{Modifier, NodeKind, NodeKindSet, SyntaxNode};

pub const VISIBLE_FOR_TESTING: &str = "com.google.common.annotations.VisibleForTesting";

pub const MESSAGE: &str = "Remove this \"protected\" modifier.";

// Rule to flag "protected" members of classes that cannot be subclassed
pub struct ProtectedMemberInFinalClassRule;

impl ProtectedMemberInFinalClassRule {
    fn check_member(&self, ctx: &mut VisitContext<'_>, member: &SyntaxNode) -> Result<(), RuleError> {
        let Some(symbol) = ctx.symbol(member) else {
            return Ok(());
        };
        if symbol.has_annotation(VISIBLE_FOR_TESTING) {
            return Ok(());
        }

        if let Some(span) = member.modifiers()?.get(Modifier::Protected) {
            ctx.report_issue(span, MESSAGE);
        }
        Ok(())
    }
}

impl SemanticRule for ProtectedMemberInFinalClassRule {
    fn id(&self) -> &'static str {
        "S2156"
    }

    fn description(&self) -> &'static str {
        "\"final\" classes should not have \"protected\" members"
    }

    fn severity(&self) -> DiagnosticSeverity {
        DiagnosticSeverity::Warning
    }

    fn nodes_to_visit(&self) -> NodeKindSet {
        NodeKindSet::of(&[NodeKind::Class])
    }

    fn visit_node(&self, ctx: &mut VisitContext<'_>, node: &SyntaxNode) -> Result<(), RuleError> {
        if !ctx.has_semantic() {
            return Ok(());
        }

        let class = node.as_type_declaration()?;
        if !class.modifiers()?.has(Modifier::Final) {
            return Ok(());
        }

        // direct members only, nested types get their own visit
        for member in class.members() {
            match member.kind() {
                NodeKind::Variable => self.check_member(ctx, member)?,
                NodeKind::Method => {
                    let not_overriding = ctx
                        .symbol(member)
                        .is_some_and(|symbol| symbol.is_overriding() == Overriding::No);
                    if not_overriding {
                        self.check_member(ctx, member)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::analysis::rule_registry::RuleRegistration;
    use crate::analysis::symbol_table::{Symbol, SymbolTable};
    use crate::analysis::{Diagnostic, DispatchEngine, SyntaxUnit};
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::parser::ast::SourcePosition;

    fn engine() -> DispatchEngine {
        DispatchEngine::new(vec![RuleRegistration::new(ProtectedMemberInFinalClassRule)])
    }

    fn check(source: &str) -> Vec<Diagnostic> {
        let unit = SyntaxUnit::from_source("Sample.java", source).unwrap();
        let report = engine().scan(&unit).unwrap();
        assert!(!report.has_faults());
        report.diagnostics
    }

    fn positions(diagnostics: &[Diagnostic]) -> Vec<(usize, usize)> {
        diagnostics
            .iter()
            .map(|d| (d.span.start.line, d.span.start.column))
            .collect()
    }

    #[test]
    fn test_flags_protected_field_and_method() {
        let source = "\
final class Sample {
  protected int counter;
  protected void bump() {}
  private int hidden;
}
";
        let diagnostics = check(source);

        assert_eq!(positions(&diagnostics), vec![(2, 3), (3, 3)]);
        for diagnostic in &diagnostics {
            assert_eq!(diagnostic.rule_id, "S2156");
            assert_eq!(diagnostic.message, MESSAGE);
            assert_eq!(diagnostic.severity, DiagnosticSeverity::Warning);
            assert_eq!(diagnostic.span.len(), Some(9));
        }
    }

    #[test]
    fn test_points_at_protected_keyword() {
        let source = "final class Sample {\n  @Deprecated static protected int counter;\n}\n";
        let diagnostics = check(source);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].span.start,
            SourcePosition { line: 2, column: 22 }
        );
    }

    #[test]
    fn test_non_final_class_is_ignored() {
        let source = "public class Sample {\n  protected int counter;\n  protected void bump() {}\n}\n";
        assert!(check(source).is_empty());
    }

    #[test]
    fn test_visible_for_testing_suppresses() {
        let source = "\
import com.google.common.annotations.VisibleForTesting;

final class Sample {
  @VisibleForTesting protected int counter;
  @com.google.common.annotations.VisibleForTesting protected void bump() {}
  protected int other;
}
";
        assert_eq!(positions(&check(source)), vec![(6, 3)]);
    }

    #[test]
    fn test_other_visible_for_testing_does_not_suppress() {
        let source = "\
package com.acme;

final class Sample {
  @VisibleForTesting protected int counter;
}
";
        // resolves to com.acme.VisibleForTesting
        assert_eq!(positions(&check(source)), vec![(4, 22)]);
    }

    #[test]
    fn test_overriding_methods_are_skipped() {
        let source = "\
final class Sample extends Base {
  @Override protected void annotated() {}
  protected void maybe() {}
  protected static void helper() {}
}
final class Plain {
  protected Object clone() { return null; }
  protected void finalize() {}
  protected void own() {}
}
";
        assert_eq!(positions(&check(source)), vec![(4, 3), (9, 3)]);
    }

    #[test]
    fn test_constructors_and_initializers_are_ignored() {
        let source = "\
final class Sample {
  protected Sample() {}
  static { }
  { }
}
";
        assert!(check(source).is_empty());
    }

    #[test]
    fn test_nested_class_checked_on_its_own() {
        let source = "\
final class Outer {
  class Inner {
    protected int notFlagged;
  }
  static final class Sealed {
    protected int flagged;
  }
  protected int outer;
}
";
        // the outer class reports before traversal reaches its members
        assert_eq!(positions(&check(source)), vec![(8, 3), (6, 5)]);
    }

    #[test]
    fn test_each_declarator_reported() {
        let source = "final class Sample {\n  protected int a, b;\n}\n";
        assert_eq!(positions(&check(source)), vec![(2, 3), (2, 3)]);
    }

    #[test]
    fn test_no_semantic_reports_nothing() {
        let source = "final class Sample {\n  protected int counter;\n}\n";
        let mut lexer = Lexer::new(source);
        let tree = Parser::new(&mut lexer).parse_unit().unwrap();
        let unit = SyntaxUnit::new("Sample.java", tree, SymbolTable::unavailable());

        let report = engine().scan(&unit).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_ambiguous_annotation_leaves_unit_without_semantic() {
        let source = "\
import com.google.common.annotations.*;

final class Sample {
  @VisibleForTesting protected int counter;
  protected int other;
}
";
        assert!(check(source).is_empty());
    }

    #[test]
    fn test_unresolved_member_is_skipped() {
        let source = "final class Sample {\n  protected int known;\n  protected int unknown;\n}\n";
        let mut lexer = Lexer::new(source);
        let tree = Parser::new(&mut lexer).parse_unit().unwrap();

        let class = &tree.root().as_compilation_unit().unwrap().types()[0];
        let known = &class.as_type_declaration().unwrap().members()[0];
        let mut symbols = SymbolTable::with_semantic();
        symbols.insert(known.id(), Symbol::variable("known"));

        let unit = SyntaxUnit::new("Sample.java", tree, symbols);
        let report = engine().scan(&unit).unwrap();
        assert_eq!(positions(&report.diagnostics), vec![(2, 3)]);
    }

    #[test]
    fn test_unknown_override_status_suppresses() {
        let source = "final class Sample {\n  protected void run() {}\n}\n";
        let mut lexer = Lexer::new(source);
        let tree = Parser::new(&mut lexer).parse_unit().unwrap();

        let class = &tree.root().as_compilation_unit().unwrap().types()[0];
        let run = &class.as_type_declaration().unwrap().members()[0];
        let mut symbols = SymbolTable::with_semantic();
        symbols.insert(run.id(), Symbol::method("run", Overriding::Unknown));

        let unit = SyntaxUnit::new("Sample.java", tree, symbols);
        assert!(engine().scan(&unit).unwrap().is_clean());
    }
}
