use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use bouncetag_core::{BounceTag, TransactionRecord};

use crate::rules::RuleSet;

/// Read-only lookup over the whole ledger, keyed by the reconciliation join
/// key. Built once per pass; candidate lists keep ledger order, so the
/// first qualifying hit is the smallest index.
#[derive(Debug)]
pub struct ReversalIndex {
    by_key: HashMap<(NaiveDate, String), Vec<usize>>,
}

impl ReversalIndex {
    pub fn build(ledger: &[TransactionRecord]) -> Self {
        let mut by_key: HashMap<(NaiveDate, String), Vec<usize>> = HashMap::new();
        for (i, record) in ledger.iter().enumerate() {
            // A record without a date can never satisfy date equality.
            if let Some(date) = record.date {
                by_key
                    .entry((date, record.cheque_number.clone()))
                    .or_default()
                    .push(i);
            }
        }
        ReversalIndex { by_key }
    }

    pub fn candidates(&self, date: NaiveDate, cheque_number: &str) -> &[usize] {
        self.by_key
            .get(&(date, cheque_number.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// The credit must land within ±5% of the debit, boundaries inclusive.
fn tolerance_band(debit: Decimal) -> (Decimal, Decimal) {
    let five_percent = debit * Decimal::new(5, 2);
    (debit - five_percent, debit + five_percent)
}

/// Searches for the reversal credit of a loan-installment debit: same
/// calendar date, same trimmed cheque number, credit (null as zero) within
/// the tolerance band. Candidates already tagged in this pass are skipped so
/// one credit cannot settle two debits. Returns the partner's ledger index.
pub fn find_loan_reversal(
    index: usize,
    ledger: &[TransactionRecord],
    reversals: &ReversalIndex,
    tags: &[Option<BounceTag>],
    rules: &RuleSet,
) -> Option<usize> {
    let record = &ledger[index];
    if !rules.has_loan_keyword(&record.normalized_narration) {
        return None;
    }
    let debit = record.debit.filter(|d| *d > Decimal::ZERO)?;
    let date = record.date?;

    let (low, high) = tolerance_band(debit);
    reversals
        .candidates(date, &record.cheque_number)
        .iter()
        .copied()
        .find(|&j| {
            if j == index || tags[j].is_some() {
                return false;
            }
            let credit = ledger[j].credit_or_zero();
            credit >= low && credit <= high
        })
}
