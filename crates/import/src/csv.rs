use std::io::{Read, Write};

use thiserror::Error;

use bouncetag_core::{StatementRow, TransactionRecord};

/// Header variants observed across bank exports, matched case-insensitively
/// on the trimmed name.
const NARRATION_HEADERS: &[&str] = &["narration", "narrations", "description", "translation"];
const DEBIT_HEADERS: &[&str] = &["debits", "debit", "dr amount"];
const CREDIT_HEADERS: &[&str] = &["credits", "credit", "cr amount"];
const BALANCE_HEADERS: &[&str] = &["balance", "available balance"];
const CHEQUE_HEADERS: &[&str] = &["cheque no", "cheque number", "cheque"];
const DATE_HEADERS: &[&str] = &["date", "txn date", "transaction date", "xn date", "xns date"];

/// The column appended to the output file.
pub const BOUNCE_TYPE_HEADER: &str = "Bounce Type";

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("no data rows")]
    NoDataRows,
}

/// Resolved positions of the canonical fields in the source header row.
/// Only the narration column is required; everything else degrades to
/// empty cells, which parse to null.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    narration: usize,
    debit: Option<usize>,
    credit: Option<usize>,
    balance: Option<usize>,
    cheque_number: Option<usize>,
    date: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &[String]) -> Result<ColumnMap, ImportError> {
        Ok(ColumnMap {
            narration: find_column(headers, NARRATION_HEADERS)
                .ok_or(ImportError::MissingColumn("narration"))?,
            debit: find_column(headers, DEBIT_HEADERS),
            credit: find_column(headers, CREDIT_HEADERS),
            balance: find_column(headers, BALANCE_HEADERS),
            cheque_number: find_column(headers, CHEQUE_HEADERS),
            date: find_column(headers, DATE_HEADERS),
        })
    }
}

fn find_column(headers: &[String], variants: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| variants.contains(&h.trim().to_lowercase().as_str()))
}

/// One ingested statement: the original header row, every data row verbatim
/// (including columns the engine does not use), and the parsed record view
/// in the same order.
#[derive(Debug)]
pub struct Statement {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub records: Vec<TransactionRecord>,
}

impl Statement {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn read_statement<R: Read>(data: R) -> Result<Statement, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let map = ColumnMap::resolve(&headers)?;

    let mut rows = Vec::new();
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        let cell = |col: Option<usize>| {
            col.and_then(|c| cells.get(c)).cloned().unwrap_or_default()
        };
        let row = StatementRow {
            narration: cell(Some(map.narration)),
            debit: cell(map.debit),
            credit: cell(map.credit),
            balance: cell(map.balance),
            cheque_number: cell(map.cheque_number),
            date: cell(map.date),
        };
        records.push(TransactionRecord::from_row(row));
        rows.push(cells);
    }

    if records.is_empty() {
        return Err(ImportError::NoDataRows);
    }

    Ok(Statement { headers, rows, records })
}

/// Writes the statement back out: original header row plus the derived
/// column, every data row verbatim plus its label. Absorbed loan debits and
/// untagged records both export an empty cell.
pub fn write_statement<W: Write>(statement: &Statement, out: W) -> Result<(), ImportError> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);

    let mut headers = statement.headers.clone();
    headers.push(BOUNCE_TYPE_HEADER.to_string());
    writer.write_record(&headers)?;

    for (cells, record) in statement.rows.iter().zip(&statement.records) {
        let mut out_row = cells.clone();
        out_row.push(record.bounce_label().to_string());
        writer.write_record(&out_row)?;
    }

    writer.flush()?;
    Ok(())
}
