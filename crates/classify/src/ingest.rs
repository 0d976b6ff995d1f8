use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use deducto_core::{Money, Transaction};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("row {row}: unparseable date {value:?}")]
    BadDate { row: usize, value: String },
    #[error("no data rows")]
    NoRows,
}

/// Date formats bank exports actually use, day-first where ambiguous.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d %b %Y", "%Y/%m/%d"];

/// Column positions resolved from the header row by name.
#[derive(Debug, Default, Clone)]
struct ColumnMap {
    id: Option<usize>,
    date: Option<usize>,
    description: Option<usize>,
    amount: Option<usize>,
    debit: Option<usize>,
    credit: Option<usize>,
    account: Option<usize>,
}

impl ColumnMap {
    fn detect(headers: &csv::StringRecord) -> Result<Self, IngestError> {
        let mut map = ColumnMap::default();
        for (i, raw) in headers.iter().enumerate() {
            let name = raw.trim().to_lowercase();
            let slot = match name.as_str() {
                "id" | "transaction id" | "reference" => &mut map.id,
                "date" | "transaction date" | "value date" => &mut map.date,
                "description" | "narrative" | "details" | "memo" => &mut map.description,
                "amount" | "value" => &mut map.amount,
                "debit" | "withdrawal" => &mut map.debit,
                "credit" | "deposit" => &mut map.credit,
                "account" | "account name" => &mut map.account,
                _ => continue,
            };
            // First header wins when a bank repeats a name.
            if slot.is_none() {
                *slot = Some(i);
            }
        }

        if map.date.is_none() {
            return Err(IngestError::MissingColumn("date"));
        }
        if map.description.is_none() {
            return Err(IngestError::MissingColumn("description"));
        }
        if map.amount.is_none() && map.debit.is_none() && map.credit.is_none() {
            return Err(IngestError::MissingColumn("amount or debit/credit"));
        }
        Ok(map)
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn cell_amount(raw: Option<&str>, row: usize, column: &str) -> Option<Money> {
    let raw = raw?;
    match Money::parse(raw) {
        Some(amount) => Some(amount),
        None => {
            warn!(row, column, value = raw, "unparseable amount, treating as zero");
            Some(Money::zero())
        }
    }
}

/// Reads a bank-export CSV into transactions. Columns are located by
/// header name; either a signed `amount` column or a `debit`/`credit`
/// pair is accepted. Spending comes out negative either way.
pub fn read_transactions<R: Read>(data: R) -> Result<Vec<Transaction>, IngestError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(data);
    let map = ColumnMap::detect(reader.headers()?)?;

    let mut transactions = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        if record.is_empty() {
            continue;
        }
        let row = index + 1;

        let field = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        let date_raw = field(map.date).unwrap_or_default();
        let date = parse_date(date_raw).ok_or_else(|| IngestError::BadDate {
            row,
            value: date_raw.to_string(),
        })?;

        let description = field(map.description).unwrap_or_default().to_string();

        let amount = if map.amount.is_some() {
            cell_amount(field(map.amount), row, "amount").unwrap_or_else(Money::zero)
        } else {
            let debit = cell_amount(field(map.debit), row, "debit");
            let credit = cell_amount(field(map.credit), row, "credit");
            match (debit, credit) {
                (Some(d), _) if !d.is_zero() => -d.abs(),
                (_, Some(c)) => c,
                _ => Money::zero(),
            }
        };

        let id = field(map.id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("tx-{row}"));

        let mut tx = Transaction::new(&id, date, &description, amount);
        tx.account = field(map.account).map(str::to_string);
        transactions.push(tx);
    }

    if transactions.is_empty() {
        return Err(IngestError::NoRows);
    }
    Ok(transactions)
}

pub fn load_transactions(path: impl AsRef<Path>) -> Result<Vec<Transaction>, IngestError> {
    let file = File::open(path)?;
    read_transactions(file)
}
