//! Raw transaction table parsed from the source CSV

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};

use crate::error::DataFormatError;

/// Columns the source file must carry; extra columns are ignored
pub const REQUIRED_COLUMNS: [&str; 4] = ["transaction_id", "user_id", "amount", "transaction_date"];

/// Cell values read as missing, matching the NA markers common CSV exporters emit
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// One source row before any type coercion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub transaction_id: Option<String>,
    pub user_id: Option<String>,
    pub amount: Option<String>,
    pub transaction_date: Option<String>,
}

/// The fetched table, in source order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub rows: Vec<RawTransaction>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse CSV bytes with a header row.
    ///
    /// Short rows are kept with their absent cells missing. A row with more
    /// fields than the header is rejected.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, DataFormatError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(bytes);

        let headers = reader.headers()?.clone();
        let [id_idx, user_idx, amount_idx, date_idx] = column_indices(&headers)?;

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() > headers.len() {
                return Err(DataFormatError::TooManyFields {
                    row: idx + 1,
                    fields: record.len(),
                    expected: headers.len(),
                });
            }
            rows.push(RawTransaction {
                transaction_id: cell(&record, id_idx),
                user_id: cell(&record, user_idx),
                amount: cell(&record, amount_idx),
                transaction_date: cell(&record, date_idx),
            });
        }

        Ok(Self { rows })
    }
}

fn column_indices(headers: &StringRecord) -> Result<[usize; 4], DataFormatError> {
    let names: Vec<&str> = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .collect();

    let mut indices = [0usize; 4];
    for (slot, column) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = names
            .iter()
            .position(|name| *name == column)
            .ok_or(DataFormatError::MissingColumn(column))?;
    }
    Ok(indices)
}

fn cell(record: &StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .filter(|value| !NA_VALUES.contains(value))
        .map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_in_order() {
        let csv = "transaction_id,user_id,amount,transaction_date\n\
                   T1,10,5.50,2024-01-02\n\
                   T2,11,abc,03/01/2024\n";
        let table = RawTable::from_csv(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].transaction_id.as_deref(), Some("T1"));
        assert_eq!(table.rows[0].amount.as_deref(), Some("5.50"));
        assert_eq!(table.rows[1].amount.as_deref(), Some("abc"));
        assert_eq!(table.rows[1].transaction_date.as_deref(), Some("03/01/2024"));
    }

    #[test]
    fn extra_and_reordered_columns() {
        let csv = "\u{feff}amount,note,transaction_date,user_id,transaction_id\n\
                   9.99,hello,2024-02-03,4,X9\n";
        let table = RawTable::from_csv(csv.as_bytes()).unwrap();

        assert_eq!(
            table.rows[0],
            RawTransaction {
                transaction_id: Some("X9".to_string()),
                user_id: Some("4".to_string()),
                amount: Some("9.99".to_string()),
                transaction_date: Some("2024-02-03".to_string()),
            }
        );
    }

    #[test]
    fn na_markers_and_blanks_are_missing() {
        let csv = "transaction_id,user_id,amount,transaction_date\n\
                   T1,  ,NaN,NULL\n";
        let table = RawTable::from_csv(csv.as_bytes()).unwrap();

        let row = &table.rows[0];
        assert_eq!(row.transaction_id.as_deref(), Some("T1"));
        assert_eq!(row.user_id, None);
        assert_eq!(row.amount, None);
        assert_eq!(row.transaction_date, None);
    }

    #[test]
    fn missing_required_column() {
        let csv = "transaction_id,user_id,transaction_date\nT1,1,2024-01-01\n";
        let err = RawTable::from_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataFormatError::MissingColumn("amount")));
    }

    #[test]
    fn short_row_keeps_absent_cells_missing() {
        let csv = "transaction_id,user_id,amount,transaction_date\n\
                   T1,1,2.0,2024-01-01\n\
                   T2,2,3.0\n";
        let table = RawTable::from_csv(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1].transaction_id.as_deref(), Some("T2"));
        assert_eq!(table.rows[1].amount.as_deref(), Some("3.0"));
        assert_eq!(table.rows[1].transaction_date, None);
    }

    #[test]
    fn long_row_is_malformed() {
        let csv = "transaction_id,user_id,amount,transaction_date\n\
                   T1,1,2.0,2024-01-01\n\
                   T2,2,3.0,2024-01-02,extra\n";
        let err = RawTable::from_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DataFormatError::TooManyFields {
                row: 2,
                fields: 5,
                expected: 4
            }
        ));
    }

    #[test]
    fn header_only_is_empty_table() {
        let csv = "transaction_id,user_id,amount,transaction_date\n";
        assert!(RawTable::from_csv(csv.as_bytes()).unwrap().is_empty());
    }
}
