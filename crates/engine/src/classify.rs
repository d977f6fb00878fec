use rust_decimal::Decimal;

use bouncetag_core::TransactionRecord;

use crate::matcher::contains_any;
use crate::rules::{
    BounceRule, RuleKind, RuleSet, CHEQUE_NON_TECHNICAL_LABEL, CHEQUE_TECHNICAL_LABEL,
};

/// Narration classification strategy. Implementations must be pure per
/// record: one record in, at most one label out, no shared mutable state.
/// The tagging pipeline is generic over this seam, so a run can swap the
/// keyword classifier for another strategy.
pub trait Classify {
    /// The category label for this record, with cheque sub-classification
    /// already applied, or `None` when the narration is not a bounce.
    fn classify(&self, record: &TransactionRecord) -> Option<String>;
}

/// Keyword-rule classifier: category precedence plus per-category guards
/// over the immutable rule set.
pub struct RuleClassifier<'a> {
    rules: &'a RuleSet,
}

impl<'a> RuleClassifier<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        RuleClassifier { rules }
    }

    fn classify_rule(&self, rule: &BounceRule, record: &TransactionRecord) -> Option<String> {
        let narration = record.normalized_narration.as_str();
        if !contains_any(narration, &rule.type_keywords) {
            return None;
        }

        match rule.kind {
            RuleKind::GstCharge => {
                (contains_any(narration, &rule.keywords)
                    && self.rules.has_bounce_indicator(narration)
                    && self.rules.has_gst_token(narration))
                .then(|| rule.label.clone())
            }
            RuleKind::Charge => (contains_any(narration, &rule.keywords)
                && self.rules.has_bounce_indicator(narration))
            .then(|| rule.label.clone()),
            RuleKind::Cheque => {
                if contains_any(narration, &rule.technical_keywords) {
                    Some(CHEQUE_TECHNICAL_LABEL.to_string())
                } else if contains_any(narration, &rule.non_technical_keywords) {
                    Some(CHEQUE_NON_TECHNICAL_LABEL.to_string())
                } else {
                    None
                }
            }
            RuleKind::Instrument => {
                contains_any(narration, &rule.keywords).then(|| rule.label.clone())
            }
        }
    }
}

impl Classify for RuleClassifier<'_> {
    fn classify(&self, record: &TransactionRecord) -> Option<String> {
        for rule in self.rules.categories() {
            let Some(label) = self.classify_rule(rule, record) else {
                continue;
            };
            if rule.inflow_only && !is_net_inflow(record) {
                // A NEFT-shaped narration that is not an inflow is not a
                // bounce at all; it does not fall through to weaker rules.
                return None;
            }
            tracing::debug!(label = %label, "narration classified");
            return Some(label);
        }
        None
    }
}

/// `credit > 0` with no debit. Null amounts never satisfy the credit side
/// and count as zero on the debit side.
fn is_net_inflow(record: &TransactionRecord) -> bool {
    let credit_positive = record.credit.is_some_and(|c| c > Decimal::ZERO);
    let debit_absent = record.debit.map_or(true, |d| d == Decimal::ZERO);
    credit_positive && debit_absent
}
