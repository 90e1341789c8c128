use std::sync::Arc;

use crate::analysis::rule::SemanticRule;
use crate::parser::ast::{NodeKind, NodeKindSet};

/// A rule together with the node kinds it is dispatched on
#[derive(Clone)]
pub struct RuleRegistration {
    rule: Arc<dyn SemanticRule>,
    kinds: NodeKindSet,
}

impl RuleRegistration {
    /// Subscribes to the kinds the rule declares
    pub fn new<R: SemanticRule + 'static>(rule: R) -> Self {
        Self::shared(Arc::new(rule))
    }

    pub fn shared(rule: Arc<dyn SemanticRule>) -> Self {
        let kinds = rule.nodes_to_visit();
        Self { rule, kinds }
    }

    /// Overrides the declared subscription
    pub fn with_kinds(mut self, kinds: NodeKindSet) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn rule(&self) -> &dyn SemanticRule {
        self.rule.as_ref()
    }

    pub fn kinds(&self) -> NodeKindSet {
        self.kinds
    }
}

impl std::fmt::Debug for RuleRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistration")
            .field("rule", &self.rule.id())
            .field("kinds", &self.kinds)
            .finish()
    }
}

/// Registrations in registration order, indexed by node kind. Fixed after construction.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    registrations: Vec<RuleRegistration>,
    by_kind: [Vec<usize>; NodeKind::COUNT],
}

impl RuleRegistry {
    pub fn new(registrations: Vec<RuleRegistration>) -> Self {
        let mut by_kind: [Vec<usize>; NodeKind::COUNT] = Default::default();
        for (index, registration) in registrations.iter().enumerate() {
            for kind in registration.kinds.iter() {
                by_kind[kind.index()].push(index);
            }
        }

        Self {
            registrations,
            by_kind,
        }
    }

    /// Registrations subscribed to `kind`, in registration order
    pub fn subscribers(&self, kind: NodeKind) -> impl Iterator<Item = &RuleRegistration> + '_ {
        self.by_kind[kind.index()]
            .iter()
            .map(|&index| &self.registrations[index])
    }

    pub fn get_all_rules(&self) -> Vec<&dyn SemanticRule> {
        self.registrations.iter().map(|r| r.rule()).collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
