use std::sync::atomic::{AtomicBool, Ordering};

use log::info;
use rayon::prelude::*;

use crate::analysis::diagnostic::DiagnosticSeverity;
use crate::analysis::rule::SemanticRule;
use crate::analysis::{DispatchEngine, EngineError, PassReport, SyntaxUnit};

/// In-memory engine configuration, fixed for the engine's lifetime
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    pub disabled_rules: Vec<String>,
    /// Opt-in list for rules that are off by default
    pub enabled_rules: Vec<String>,
    pub warnings_as_errors: bool,
}

impl AnalyzerConfig {
    pub fn is_rule_enabled(&self, rule: &dyn SemanticRule) -> bool {
        let id = rule.id();
        if self.disabled_rules.iter().any(|r| r == id) {
            return false;
        }
        rule.enabled_by_default() || self.enabled_rules.iter().any(|r| r == id)
    }
}

/// Result of one unit in a multi-unit run
#[derive(Debug)]
pub enum UnitOutcome {
    Completed(PassReport),
    Aborted(EngineError),
    /// The run was cancelled before this unit started
    Cancelled,
}

impl UnitOutcome {
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            UnitOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

impl DispatchEngine {
    /// Runs one independent pass per unit on the rayon pool.
    ///
    /// `cancel` is checked before a unit starts, never during a pass. Outcomes are
    /// returned in the order of `units`.
    pub fn scan_units(&self, units: &[SyntaxUnit], cancel: &AtomicBool) -> Vec<UnitOutcome> {
        units
            .par_iter()
            .map(|unit| {
                if cancel.load(Ordering::Acquire) {
                    info!("skipping {}: run cancelled", unit.name());
                    return UnitOutcome::Cancelled;
                }
                match self.scan(unit) {
                    Ok(report) => UnitOutcome::Completed(report),
                    Err(err) => UnitOutcome::Aborted(err),
                }
            })
            .collect()
    }

    // Method to get all available rules
    pub fn list_rules(&self) -> Vec<(&'static str, &'static str, DiagnosticSeverity)> {
        self.rule_registry
            .get_all_rules()
            .iter()
            .map(|rule| (rule.id(), rule.description(), rule.severity()))
            .collect()
    }
}
