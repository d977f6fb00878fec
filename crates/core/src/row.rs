use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::parse::{parse_amount, parse_txn_date};

/// The six canonical cells of one ledger row, exactly as they appeared in
/// the source file. Original casing and number/date formatting are kept so
/// export can reproduce the input byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRow {
    pub narration: String,
    pub debit: String,
    pub credit: String,
    pub balance: String,
    pub cheque_number: String,
    pub date: String,
}

/// One ledger row: the verbatim source cells plus the parsed view the
/// engine matches against. The parsed fields are derived once at
/// construction and never written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub row: StatementRow,
    /// Lower-cased, trimmed narration. Matching input only.
    pub normalized_narration: String,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub balance: Option<Decimal>,
    /// Trimmed cheque number. Join key, compared as a string.
    pub cheque_number: String,
    pub date: Option<NaiveDate>,
    /// The only derived output field.
    pub bounce_type: Option<BounceTag>,
}

impl TransactionRecord {
    pub fn from_row(row: StatementRow) -> Self {
        let normalized_narration = row.narration.trim().to_lowercase();
        let debit = parse_amount(&row.debit);
        let credit = parse_amount(&row.credit);
        let balance = parse_amount(&row.balance);
        let cheque_number = row.cheque_number.trim().to_string();
        let date = parse_txn_date(&row.date);
        TransactionRecord {
            row,
            normalized_narration,
            debit,
            credit,
            balance,
            cheque_number,
            date,
            bounce_type: None,
        }
    }

    /// Credit amount with the null-as-zero semantics the reconciliation
    /// tolerance check uses.
    pub fn credit_or_zero(&self) -> Decimal {
        self.credit.unwrap_or(Decimal::ZERO)
    }

    /// The exported cell for the derived column. Untagged records and
    /// absorbed loan debits both export empty; in memory they stay distinct.
    pub fn bounce_label(&self) -> &str {
        match &self.bounce_type {
            Some(tag) => tag.label(),
            None => "",
        }
    }
}

/// Outcome of a tagging pass for one record.
///
/// `Absorbed` is the explicit empty marker for a loan debit whose reversal
/// credit was found: the pair carries one `LoanBounce` label on the credit
/// side, and the debit is absorbed with no label of its own. `None` on the
/// record means "not a bounce", which exports the same but is a different
/// state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BounceTag {
    /// A category label decided from the narration, e.g. `BOUNCE CHARGES`
    /// or `Cheque Bounce - Technical`.
    Category(String),
    /// The reversal credit of a matched loan-installment pair.
    LoanBounce,
    /// The debit side of a matched loan-installment pair.
    Absorbed,
}

pub const LOAN_BOUNCE_LABEL: &str = "Loan Bounce";

impl BounceTag {
    pub fn label(&self) -> &str {
        match self {
            BounceTag::Category(label) => label,
            BounceTag::LoanBounce => LOAN_BOUNCE_LABEL,
            BounceTag::Absorbed => "",
        }
    }
}

impl fmt::Display for BounceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
