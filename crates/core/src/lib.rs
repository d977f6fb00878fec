pub mod parse;
pub mod row;

pub use parse::{parse_amount, parse_txn_date};
pub use row::{BounceTag, StatementRow, TransactionRecord, LOAN_BOUNCE_LABEL};
