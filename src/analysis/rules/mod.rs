mod protected_member_in_final_class;

pub use protected_member_in_final_class::ProtectedMemberInFinalClassRule;

use crate::analysis::rule_registry::RuleRegistration;

/// Every rule shipped with the crate, in dispatch order
pub fn builtin_rules() -> Vec<RuleRegistration> {
    vec![RuleRegistration::new(ProtectedMemberInFinalClassRule)]
}
