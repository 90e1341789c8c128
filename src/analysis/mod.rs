mod context;
mod diagnostic;
mod external_api;
mod resolver;
mod rule;
mod rule_registry;
pub mod rules;
mod symbol_table;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, trace, warn};
use thiserror::Error;

pub use crate::analysis::context::VisitContext;
pub use crate::analysis::diagnostic::{Diagnostic, DiagnosticSeverity, DiagnosticSink};
pub use crate::analysis::external_api::{AnalyzerConfig, UnitOutcome};
pub use crate::analysis::resolver::Resolver;
pub use crate::analysis::rule::{RuleError, SemanticRule};
pub use crate::analysis::rule_registry::{RuleRegistration, RuleRegistry};
pub use crate::analysis::symbol_table::{Overriding, Symbol, SymbolKind, SymbolTable};

use crate::CheckError;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::parser::ast::{SourceSpan, SyntaxNode, SyntaxTree, TypeMismatch};

/// One source file: its tree and the symbols resolved for it
#[derive(Debug, Clone)]
pub struct SyntaxUnit {
    name: String,
    tree: SyntaxTree,
    symbols: SymbolTable,
}

impl SyntaxUnit {
    pub fn new(name: impl Into<String>, tree: SyntaxTree, symbols: SymbolTable) -> Self {
        Self {
            name: name.into(),
            tree,
            symbols,
        }
    }

    /// Parses `source` and resolves its symbols with [`Resolver`]
    pub fn from_source(name: impl Into<String>, source: &str) -> Result<Self, Vec<CheckError>> {
        let mut lexer = Lexer::new(source);
        let tree = Parser::new(&mut lexer).parse_unit()?;
        let symbols = Resolver::resolve(&tree);
        Ok(Self::new(name, tree, symbols))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultReason {
    Error(String),
    Panic(String),
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultReason::Error(message) => write!(f, "{}", message),
            FaultReason::Panic(message) => write!(f, "panicked: {}", message),
        }
    }
}

/// A rule failed on one node; the rest of the pass went on without it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule {rule_id} failed at {span}: {reason}")]
pub struct EngineFault {
    pub rule_id: String,
    pub span: SourceSpan,
    pub reason: FaultReason,
}

/// A pass that could not complete; none of its diagnostics are kept
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rule {rule_id} used the wrong node accessor at {span}")]
    TypeMismatch {
        rule_id: String,
        span: SourceSpan,
        #[source]
        source: TypeMismatch,
    },
}

/// Everything one pass produced
#[derive(Debug, Default)]
pub struct PassReport {
    pub unit: String,
    pub diagnostics: Vec<Diagnostic>,
    pub faults: Vec<EngineFault>,
    pub nodes_visited: usize,
}

impl PassReport {
    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.faults.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Visit,
    Leave,
}

struct Pass<'u> {
    symbols: &'u SymbolTable,
    sink: DiagnosticSink,
    faults: Vec<EngineFault>,
    nodes_visited: usize,
}

/// Walks a syntax tree once per unit and calls every subscribed rule on each node
pub struct DispatchEngine {
    rule_registry: RuleRegistry,
    config: AnalyzerConfig,
}

impl DispatchEngine {
    pub fn new(registrations: Vec<RuleRegistration>) -> Self {
        Self::with_config(registrations, AnalyzerConfig::default())
    }

    pub fn with_config(registrations: Vec<RuleRegistration>, config: AnalyzerConfig) -> Self {
        let enabled: Vec<RuleRegistration> = registrations
            .into_iter()
            .filter(|registration| config.is_rule_enabled(registration.rule()))
            .collect();

        Self {
            rule_registry: RuleRegistry::new(enabled),
            config,
        }
    }

    /// Engine with every built-in rule
    pub fn with_builtin_rules() -> Self {
        Self::new(rules::builtin_rules())
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.rule_registry
    }

    /// One pre-order pass over `unit`
    pub fn scan(&self, unit: &SyntaxUnit) -> Result<PassReport, EngineError> {
        debug!(
            "scanning {} with {} rules (semantic: {})",
            unit.name(),
            self.rule_registry.len(),
            unit.symbols().has_semantic()
        );

        let mut pass = Pass {
            symbols: unit.symbols(),
            sink: DiagnosticSink::new(),
            faults: Vec::new(),
            nodes_visited: 0,
        };

        if let Err(err) = self.visit_node(&mut pass, unit.tree().root()) {
            error!("pass over {} aborted: {}", unit.name(), err);
            return Err(err);
        }

        let mut diagnostics = pass.sink.drain();
        if self.config.warnings_as_errors {
            for diagnostic in &mut diagnostics {
                if diagnostic.severity == DiagnosticSeverity::Warning {
                    diagnostic.severity = DiagnosticSeverity::Error;
                }
            }
        }

        debug!(
            "finished {}: {} nodes, {} diagnostics, {} faults",
            unit.name(),
            pass.nodes_visited,
            diagnostics.len(),
            pass.faults.len()
        );

        Ok(PassReport {
            unit: unit.name().to_string(),
            diagnostics,
            faults: pass.faults,
            nodes_visited: pass.nodes_visited,
        })
    }

    fn visit_node(&self, pass: &mut Pass<'_>, node: &SyntaxNode) -> Result<(), EngineError> {
        pass.nodes_visited += 1;
        let kind = node.kind();

        for registration in self.rule_registry.subscribers(kind) {
            self.dispatch(pass, registration, node, Phase::Visit)?;
        }

        for child in node.children() {
            self.visit_node(pass, child)?;
        }

        for registration in self.rule_registry.subscribers(kind) {
            self.dispatch(pass, registration, node, Phase::Leave)?;
        }

        Ok(())
    }

    fn dispatch(
        &self,
        pass: &mut Pass<'_>,
        registration: &RuleRegistration,
        node: &SyntaxNode,
        phase: Phase,
    ) -> Result<(), EngineError> {
        let rule = registration.rule();
        trace!("{:?} {} on {} at {}", phase, rule.id(), node.kind(), node.span());

        let mut ctx = VisitContext::new(pass.symbols, &mut pass.sink, rule.id(), rule.severity());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match phase {
            Phase::Visit => rule.visit_node(&mut ctx, node),
            Phase::Leave => rule.leave_node(&mut ctx, node),
        }));

        let reason = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(RuleError::TypeMismatch(source))) => {
                return Err(EngineError::TypeMismatch {
                    rule_id: rule.id().to_string(),
                    span: node.span(),
                    source,
                });
            }
            Ok(Err(RuleError::Failed(message))) => FaultReason::Error(message),
            Err(payload) => FaultReason::Panic(panic_message(payload.as_ref())),
        };

        let fault = EngineFault {
            rule_id: rule.id().to_string(),
            span: node.span(),
            reason,
        };
        warn!("{}", fault);
        pass.faults.push(fault);
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::ast::{NodeKind, NodeKindSet};

    /// Records every callback it receives as "visit KIND line:col" / "leave KIND line:col"
    struct Recorder {
        kinds: NodeKindSet,
        log: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(kinds: NodeKindSet) -> Self {
            Self {
                kinds,
                log: Mutex::new(Vec::new()),
            }
        }

        fn entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl SemanticRule for Recorder {
        fn id(&self) -> &'static str {
            "recorder"
        }
        fn description(&self) -> &'static str {
            "Records dispatch order"
        }
        fn severity(&self) -> DiagnosticSeverity {
            DiagnosticSeverity::Info
        }
        fn nodes_to_visit(&self) -> NodeKindSet {
            self.kinds
        }
        fn visit_node(&self, _ctx: &mut VisitContext<'_>, node: &SyntaxNode) -> Result<(), RuleError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("visit {} {}", node.kind(), node.span()));
            Ok(())
        }
        fn leave_node(&self, _ctx: &mut VisitContext<'_>, node: &SyntaxNode) -> Result<(), RuleError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("leave {} {}", node.kind(), node.span()));
            Ok(())
        }
    }

    /// Reports one info diagnostic on each variable
    struct EveryVariable;

    impl SemanticRule for EveryVariable {
        fn id(&self) -> &'static str {
            "every-variable"
        }
        fn description(&self) -> &'static str {
            "Reports each variable"
        }
        fn severity(&self) -> DiagnosticSeverity {
            DiagnosticSeverity::Warning
        }
        fn nodes_to_visit(&self) -> NodeKindSet {
            NodeKindSet::of(&[NodeKind::Variable])
        }
        fn visit_node(&self, ctx: &mut VisitContext<'_>, node: &SyntaxNode) -> Result<(), RuleError> {
            let name = node.as_variable()?.name().to_string();
            ctx.report_issue_on(node, format!("variable {}", name));
            Ok(())
        }
    }

    /// Fails on the method called `boom`, either by error or by panic
    struct Faulty {
        panics: bool,
    }

    impl SemanticRule for Faulty {
        fn id(&self) -> &'static str {
            "faulty"
        }
        fn description(&self) -> &'static str {
            "Fails on purpose"
        }
        fn severity(&self) -> DiagnosticSeverity {
            DiagnosticSeverity::Error
        }
        fn nodes_to_visit(&self) -> NodeKindSet {
            NodeKindSet::of(&[NodeKind::Method])
        }
        fn visit_node(&self, ctx: &mut VisitContext<'_>, node: &SyntaxNode) -> Result<(), RuleError> {
            let method = node.as_method()?;
            if method.name() != "boom" {
                ctx.report_issue_on(node, format!("method {}", method.name()));
                return Ok(());
            }
            ctx.report_issue_on(node, "about to fail");
            if self.panics {
                panic!("boom went off");
            }
            Err(RuleError::Failed("boom went off".to_string()))
        }
    }

    /// Panics after the subtree of the variable called `b`
    struct FaultyLeave;

    impl SemanticRule for FaultyLeave {
        fn id(&self) -> &'static str {
            "faulty-leave"
        }
        fn description(&self) -> &'static str {
            "Fails on leave"
        }
        fn severity(&self) -> DiagnosticSeverity {
            DiagnosticSeverity::Error
        }
        fn nodes_to_visit(&self) -> NodeKindSet {
            NodeKindSet::of(&[NodeKind::Variable])
        }
        fn visit_node(&self, _ctx: &mut VisitContext<'_>, _node: &SyntaxNode) -> Result<(), RuleError> {
            Ok(())
        }
        fn leave_node(&self, _ctx: &mut VisitContext<'_>, node: &SyntaxNode) -> Result<(), RuleError> {
            if node.as_variable()?.name() == "b" {
                panic!("left b");
            }
            Ok(())
        }
    }

    /// Misuses an accessor on every class
    struct Misuser;

    impl SemanticRule for Misuser {
        fn id(&self) -> &'static str {
            "misuser"
        }
        fn description(&self) -> &'static str {
            "Calls the wrong accessor"
        }
        fn severity(&self) -> DiagnosticSeverity {
            DiagnosticSeverity::Error
        }
        fn nodes_to_visit(&self) -> NodeKindSet {
            NodeKindSet::of(&[NodeKind::Class])
        }
        fn visit_node(&self, _ctx: &mut VisitContext<'_>, node: &SyntaxNode) -> Result<(), RuleError> {
            node.as_variable()?;
            Ok(())
        }
    }

    struct OffByDefault;

    impl SemanticRule for OffByDefault {
        fn id(&self) -> &'static str {
            "off-by-default"
        }
        fn description(&self) -> &'static str {
            "Only runs when enabled"
        }
        fn severity(&self) -> DiagnosticSeverity {
            DiagnosticSeverity::Info
        }
        fn nodes_to_visit(&self) -> NodeKindSet {
            NodeKindSet::of(&[NodeKind::CompilationUnit])
        }
        fn visit_node(&self, ctx: &mut VisitContext<'_>, node: &SyntaxNode) -> Result<(), RuleError> {
            ctx.report_issue_on(node, "unit");
            Ok(())
        }
        fn enabled_by_default(&self) -> bool {
            false
        }
    }

    const TWO_CLASSES: &str = "class A {\n  int a;\n  void f() {}\n}\nclass B {\n  int b;\n}\n";

    fn unit(source: &str) -> SyntaxUnit {
        SyntaxUnit::from_source("Test.java", source).unwrap()
    }

    fn count_nodes(node: &SyntaxNode) -> usize {
        1 + node.children().iter().map(|c| count_nodes(c)).sum::<usize>()
    }

    #[test]
    fn test_pre_order_with_leave_after_subtree() {
        let recorder = std::sync::Arc::new(Recorder::new(NodeKindSet::of(&[
            NodeKind::Class,
            NodeKind::Method,
            NodeKind::Variable,
        ])));
        let engine = DispatchEngine::new(vec![RuleRegistration::shared(recorder.clone())]);

        let report = engine.scan(&unit(TWO_CLASSES)).unwrap();
        assert!(report.is_clean());
        assert_eq!(
            recorder.entries(),
            vec![
                "visit CLASS 1:1",
                "visit VARIABLE 2:3",
                "leave VARIABLE 2:3",
                "visit METHOD 3:3",
                "leave METHOD 3:3",
                "leave CLASS 1:1",
                "visit CLASS 5:1",
                "visit VARIABLE 6:3",
                "leave VARIABLE 6:3",
                "leave CLASS 5:1",
            ]
        );
    }

    #[test]
    fn test_every_node_visited_exactly_once() {
        let recorder = std::sync::Arc::new(Recorder::new(NodeKindSet::all()));
        let engine = DispatchEngine::new(vec![RuleRegistration::shared(recorder.clone())]);
        let unit = unit(TWO_CLASSES);

        let report = engine.scan(&unit).unwrap();
        let visits = recorder
            .entries()
            .iter()
            .filter(|e| e.starts_with("visit"))
            .count();
        assert_eq!(report.nodes_visited, count_nodes(unit.tree().root()));
        assert_eq!(visits, report.nodes_visited);
    }

    #[test]
    fn test_subscription_override_narrows_dispatch() {
        let recorder = std::sync::Arc::new(Recorder::new(NodeKindSet::all()));
        let registration = RuleRegistration::shared(recorder.clone())
            .with_kinds(NodeKindSet::of(&[NodeKind::Block]));
        let engine = DispatchEngine::new(vec![registration]);

        engine.scan(&unit(TWO_CLASSES)).unwrap();
        assert_eq!(recorder.entries(), vec!["visit BLOCK 3:12", "leave BLOCK 3:12"]);
    }

    #[test]
    fn test_error_fault_is_isolated() {
        let engine = DispatchEngine::new(vec![
            RuleRegistration::new(Faulty { panics: false }),
            RuleRegistration::new(EveryVariable),
        ]);
        let source = "class A {\n  int a;\n  void boom() {}\n  void ok() {}\n  int b;\n}\n";

        let report = engine.scan(&unit(source)).unwrap();

        assert_eq!(report.faults.len(), 1);
        let fault = &report.faults[0];
        assert_eq!(fault.rule_id, "faulty");
        assert_eq!(fault.span.start.line, 3);
        assert_eq!(fault.reason, FaultReason::Error("boom went off".to_string()));

        let messages: Vec<&str> = report.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["variable a", "about to fail", "method ok", "variable b"]
        );
    }

    #[test]
    fn test_panic_fault_is_isolated() {
        let engine = DispatchEngine::new(vec![
            RuleRegistration::new(Faulty { panics: true }),
            RuleRegistration::new(EveryVariable),
        ]);
        let source = "class A {\n  void boom() {}\n  int b;\n}\n";

        let report = engine.scan(&unit(source)).unwrap();

        assert_eq!(report.faults.len(), 1);
        assert_eq!(
            report.faults[0].reason,
            FaultReason::Panic("boom went off".to_string())
        );
        assert_eq!(report.faults[0].to_string(), "rule faulty failed at 2:3: panicked: boom went off");
        assert_eq!(report.diagnostics.len(), 2);
        assert_eq!(report.diagnostics[1].message, "variable b");
    }

    #[test]
    fn test_leave_fault_is_isolated() {
        let engine = DispatchEngine::new(vec![
            RuleRegistration::new(FaultyLeave),
            RuleRegistration::new(EveryVariable),
        ]);
        let source = "class A {\n  int a;\n  int b;\n  int c;\n}\n";

        let report = engine.scan(&unit(source)).unwrap();

        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].rule_id, "faulty-leave");
        assert_eq!(report.faults[0].span.start.line, 3);
        assert_eq!(report.faults[0].reason, FaultReason::Panic("left b".to_string()));

        let messages: Vec<&str> = report.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["variable a", "variable b", "variable c"]);
    }

    #[test]
    fn test_type_mismatch_aborts_pass() {
        let engine = DispatchEngine::new(vec![
            RuleRegistration::new(EveryVariable),
            RuleRegistration::new(Misuser),
        ]);

        let err = engine.scan(&unit(TWO_CLASSES)).unwrap_err();
        let EngineError::TypeMismatch { rule_id, span, source } = err;
        assert_eq!(rule_id, "misuser");
        assert_eq!(span.start.line, 1);
        assert_eq!(source.found, NodeKind::Class);
    }

    #[test]
    fn test_config_disables_and_enables_rules() {
        let config = AnalyzerConfig {
            disabled_rules: vec!["every-variable".to_string()],
            enabled_rules: vec!["off-by-default".to_string()],
            warnings_as_errors: false,
        };
        let engine = DispatchEngine::with_config(
            vec![
                RuleRegistration::new(EveryVariable),
                RuleRegistration::new(OffByDefault),
            ],
            config,
        );

        let ids: Vec<&str> = engine.list_rules().iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, vec!["off-by-default"]);

        let report = engine.scan(&unit(TWO_CLASSES)).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].message, "unit");

        let default_engine = DispatchEngine::new(vec![RuleRegistration::new(OffByDefault)]);
        assert!(default_engine.registry().is_empty());
    }

    #[test]
    fn test_warnings_as_errors() {
        let config = AnalyzerConfig {
            warnings_as_errors: true,
            ..AnalyzerConfig::default()
        };
        let engine = DispatchEngine::with_config(vec![RuleRegistration::new(EveryVariable)], config);

        let report = engine.scan(&unit(TWO_CLASSES)).unwrap();
        assert_eq!(report.diagnostics.len(), 2);
        assert!(report
            .diagnostics
            .iter()
            .all(|d| d.severity == DiagnosticSeverity::Error));
    }

    #[test]
    fn test_scan_units_keeps_order_and_isolates_passes() {
        let engine = DispatchEngine::new(vec![RuleRegistration::new(EveryVariable)]);
        let units: Vec<SyntaxUnit> = (0..16)
            .map(|i| {
                let fields: String = (0..i).map(|n| format!("int f{};", n)).collect();
                SyntaxUnit::from_source(format!("U{}.java", i), &format!("class U{} {{ {} }}", i, fields))
                    .unwrap()
            })
            .collect();

        let outcomes = engine.scan_units(&units, &AtomicBool::new(false));

        assert_eq!(outcomes.len(), 16);
        for (i, outcome) in outcomes.iter().enumerate() {
            let report = outcome.report().unwrap();
            assert_eq!(report.unit, format!("U{}.java", i));
            assert_eq!(report.diagnostics.len(), i);
        }
    }

    #[test]
    fn test_cancelled_run_starts_no_units() {
        let engine = DispatchEngine::new(vec![RuleRegistration::new(EveryVariable)]);
        let units = vec![unit(TWO_CLASSES), unit(TWO_CLASSES)];

        let outcomes = engine.scan_units(&units, &AtomicBool::new(true));
        assert!(outcomes.iter().all(|o| matches!(o, UnitOutcome::Cancelled)));
    }
}
