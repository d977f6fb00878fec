use std::collections::BTreeMap;

use bouncetag_core::{BounceTag, TransactionRecord};

use crate::classify::{Classify, RuleClassifier};
use crate::recon::{find_loan_reversal, ReversalIndex};
use crate::rules::RuleSet;

/// Orchestrates one tagging pass over a ledger snapshot.
///
/// Records are visited in ledger order. Reconciliation takes priority for
/// every record; only when no reversal partner exists does the record reach
/// the classifier. Tag decisions accumulate in a buffer during the search
/// and are committed in a single write phase, so the search never observes
/// partially-updated state, and `bounce_type` is the only field written.
pub struct Tagger {
    rules: RuleSet,
}

impl Tagger {
    pub fn new(rules: RuleSet) -> Self {
        Tagger { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Tags with the keyword-rule classifier.
    pub fn tag(&self, ledger: &mut [TransactionRecord]) {
        let classifier = RuleClassifier::new(&self.rules);
        self.tag_with(&classifier, ledger);
    }

    /// Tags with any classification strategy. The reconciliation matcher is
    /// always the keyword engine; only the per-record narration step is
    /// swappable.
    pub fn tag_with(&self, classifier: &dyn Classify, ledger: &mut [TransactionRecord]) {
        let reversals = ReversalIndex::build(ledger);
        let mut tags: Vec<Option<BounceTag>> = vec![None; ledger.len()];

        for i in 0..ledger.len() {
            // Claimed as a reversal partner by an earlier record; never
            // reclassified.
            if tags[i].is_some() {
                continue;
            }

            if let Some(j) = find_loan_reversal(i, ledger, &reversals, &tags, &self.rules) {
                tags[i] = Some(BounceTag::Absorbed);
                tags[j] = Some(BounceTag::LoanBounce);
                tracing::debug!(debit = i, credit = j, "loan reversal paired");
                continue;
            }

            if let Some(label) = classifier.classify(&ledger[i]) {
                tags[i] = Some(BounceTag::Category(label));
            }
        }

        // Commit phase: the single write to the records.
        for (record, tag) in ledger.iter_mut().zip(tags) {
            record.bounce_type = tag;
        }

        let summary = tag_summary(ledger);
        tracing::info!(records = ledger.len(), tagged = summary.values().sum::<usize>(), "tagging pass complete");
    }
}

/// Count of records per output label, empty labels excluded. Ordered by
/// label for stable display.
pub fn tag_summary(ledger: &[TransactionRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in ledger {
        let label = record.bounce_label();
        if !label.is_empty() {
            *counts.entry(label.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use bouncetag_core::StatementRow;

    fn record(narration: &str, debit: &str, credit: &str, cheque: &str, date: &str) -> TransactionRecord {
        TransactionRecord::from_row(StatementRow {
            narration: narration.to_string(),
            debit: debit.to_string(),
            credit: credit.to_string(),
            balance: "1,234.00".to_string(),
            cheque_number: cheque.to_string(),
            date: date.to_string(),
        })
    }

    fn tagger() -> Tagger {
        Tagger::new(RuleSet::builtin().unwrap())
    }

    fn labels(ledger: &[TransactionRecord]) -> Vec<Option<BounceTag>> {
        ledger.iter().map(|r| r.bounce_type.clone()).collect()
    }

    #[test]
    fn loan_pair_marks_debit_empty_and_credit_loan_bounce() {
        let mut ledger = vec![
            record("emi debit", "10000", "", "123", "2024-01-05"),
            record("reversal", "", "10050", "123", "2024-01-05"),
        ];
        tagger().tag(&mut ledger);
        assert_eq!(ledger[0].bounce_type, Some(BounceTag::Absorbed));
        assert_eq!(ledger[1].bounce_type, Some(BounceTag::LoanBounce));
        assert_eq!(ledger[0].bounce_label(), "");
        assert_eq!(ledger[1].bounce_label(), "Loan Bounce");
    }

    #[test]
    fn unpaired_loan_debit_falls_through_to_classifier() {
        let mut ledger = vec![
            record("emi ecs rtn chg", "10000", "", "123", "2024-01-05"),
            record("reversal", "", "10600", "123", "2024-01-05"),
        ];
        tagger().tag(&mut ledger);
        // 10600 is outside the band; the debit classifies on narration.
        assert_eq!(
            ledger[0].bounce_type,
            Some(BounceTag::Category("BOUNCE CHARGES".to_string()))
        );
    }

    #[test]
    fn claimed_partner_is_not_reclassified() {
        // The reversal credit's own narration would classify as NEFT, but
        // the earlier record's pairing wins.
        let mut ledger = vec![
            record("emi debit", "10000", "", "9", "2024-01-05"),
            record("neft return", "", "10000", "9", "2024-01-05"),
        ];
        tagger().tag(&mut ledger);
        assert_eq!(ledger[1].bounce_type, Some(BounceTag::LoanBounce));
    }

    #[test]
    fn one_credit_cannot_settle_two_debits() {
        let mut ledger = vec![
            record("emi debit first", "10000", "", "5", "2024-01-05"),
            record("emi debit second", "10000", "", "5", "2024-01-05"),
            record("reversal", "", "10000", "5", "2024-01-05"),
        ];
        tagger().tag(&mut ledger);
        assert_eq!(ledger[0].bounce_type, Some(BounceTag::Absorbed));
        assert_eq!(ledger[2].bounce_type, Some(BounceTag::LoanBounce));
        // The second debit found no free partner and has no bounce
        // narration of its own.
        assert_eq!(ledger[1].bounce_type, None);
    }

    #[test]
    fn ordinary_records_classify_per_narration() {
        let mut ledger = vec![
            record("salary credit", "", "50000", "", "2024-01-01"),
            record("neft return", "", "500", "", "2024-01-02"),
            record("chq return funds insufficient", "2000", "", "11", "2024-01-03"),
        ];
        tagger().tag(&mut ledger);
        assert_eq!(labels(&ledger), vec![
            None,
            Some(BounceTag::Category("NEFT".to_string())),
            Some(BounceTag::Category("Cheque Bounce - Non-Technical".to_string())),
        ]);
    }

    #[test]
    fn tag_is_idempotent() {
        let mut ledger = vec![
            record("emi debit", "10000", "", "123", "2024-01-05"),
            record("reversal", "", "10050", "123", "2024-01-05"),
            record("ecs rtn chg ref123", "590", "", "", "2024-01-06"),
            record("retail purchase emi due", "2500", "", "", "2024-01-07"),
        ];
        let tagger = tagger();
        tagger.tag(&mut ledger);
        let first = labels(&ledger);
        tagger.tag(&mut ledger);
        assert_eq!(labels(&ledger), first);
    }

    #[test]
    fn tag_preserves_every_other_field() {
        let mut ledger = vec![
            record("  NEFT Return REF 9 ", "0", "500.00", " 42 ", "05/01/2024"),
            record("emi debit", "10,000.00", "", "123", "2024-01-05"),
        ];
        let rows_before: Vec<StatementRow> = ledger.iter().map(|r| r.row.clone()).collect();
        tagger().tag(&mut ledger);
        let rows_after: Vec<StatementRow> = ledger.iter().map(|r| r.row.clone()).collect();
        assert_eq!(rows_before, rows_after);
    }

    #[test]
    fn summary_counts_labels() {
        let mut ledger = vec![
            record("emi debit", "10000", "", "123", "2024-01-05"),
            record("reversal", "", "10050", "123", "2024-01-05"),
            record("ecs rtn chg", "590", "", "", "2024-01-06"),
            record("upi rev", "", "120", "", "2024-01-06"),
            record("salary", "", "90000", "", "2024-01-07"),
        ];
        tagger().tag(&mut ledger);
        let summary = tag_summary(&ledger);
        assert_eq!(summary.get("Loan Bounce"), Some(&1));
        assert_eq!(summary.get("BOUNCE CHARGES"), Some(&1));
        assert_eq!(summary.get("UPI"), Some(&1));
        // The absorbed debit and the untagged record do not appear.
        assert_eq!(summary.values().sum::<usize>(), 3);
    }
}
