use thiserror::Error;

use crate::analysis::context::VisitContext;
use crate::analysis::diagnostic::DiagnosticSeverity;
use crate::parser::ast::{NodeKindSet, SyntaxNode, TypeMismatch};

/// Failure returned from a rule callback
#[derive(Debug, Error)]
pub enum RuleError {
    /// Rule code used the wrong accessor, aborts the pass
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),
    /// Any other failure, isolated to this rule and node
    #[error("{0}")]
    Failed(String),
}

/// A check that subscribes to node kinds and reports diagnostics.
///
/// The same instance may serve several passes running on different threads at
/// once, so implementations keep no per-pass state.
pub trait SemanticRule: Send + Sync {
    // Unique identifier for this rule
    fn id(&self) -> &'static str;

    // Short description of what this rule checks
    fn description(&self) -> &'static str;

    // Severity level of violations (error, warning, info)
    fn severity(&self) -> DiagnosticSeverity;

    // Node kinds this rule wants to be called for
    fn nodes_to_visit(&self) -> NodeKindSet;

    // Called before the node's children are visited
    fn visit_node(&self, ctx: &mut VisitContext<'_>, node: &SyntaxNode) -> Result<(), RuleError>;

    // Called after the node's whole subtree was visited
    #[allow(unused_variables)]
    fn leave_node(&self, ctx: &mut VisitContext<'_>, node: &SyntaxNode) -> Result<(), RuleError> {
        Ok(())
    }

    // Optional: whether this rule is enabled by default
    fn enabled_by_default(&self) -> bool {
        true
    }
}
