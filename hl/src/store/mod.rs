//! Store adapters
//!
//! The session only talks to the [`HabitStore`] trait. [`SheetsStore`] writes
//! to Google Sheets; [`MemoryStore`] keeps rows in memory for tests.

mod auth;
mod memory;
mod sheets;

pub use auth::{Credentials, GOOGLE_TOKEN_URI, SHEETS_SCOPE, ServiceAccount, ServiceAccountKey};
pub use memory::{MemoryStore, StoreFailures};
pub use sheets::{SHEETS_API_BASE, SheetsStore, column_letter};

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use crate::error::HabitError;
use crate::planner::{DATE_FORMAT, iso_date};
use crate::record::{CellValue, DATE_COLUMN, Row};

/// Tabular sink of daily records
///
/// Callers issue one request at a time and wait for it to resolve.
#[async_trait]
pub trait HabitStore: Send + Sync {
    /// Read the header row, in column order
    async fn fetch_schema(&self) -> Result<Vec<String>, HabitError>;

    /// Read every value in the `date` column
    ///
    /// Requires [`HabitStore::fetch_schema`] to have located that column.
    async fn fetch_existing_dates(&self) -> Result<HashSet<String>, HabitError>;

    /// Append one row
    ///
    /// Values for columns the destination lacks are dropped; destination
    /// columns missing from `row` are left blank.
    async fn append_record(&self, row: &Row) -> Result<(), HabitError>;
}

/// Header name to zero-based column index
pub type HeaderIndex = HashMap<String, usize>;

/// Index a header row; the first occurrence of a repeated name wins
pub fn index_headers(headers: &[String]) -> HeaderIndex {
    let mut index = HeaderIndex::new();
    for (i, header) in headers.iter().enumerate() {
        index.entry(header.clone()).or_insert(i);
    }
    index
}

/// Position of the `date` column, or a schema error
pub fn date_column(index: &HeaderIndex) -> Result<usize, HabitError> {
    index
        .get(DATE_COLUMN)
        .copied()
        .ok_or_else(|| HabitError::Schema(format!("required column '{}' missing in sheet", DATE_COLUMN)))
}

/// Lay `row` out along the header index
///
/// The result is as wide as the header row. Unknown columns are dropped and
/// unset columns stay `None`.
pub fn layout_row(index: &HeaderIndex, row: &Row) -> Vec<Option<CellValue>> {
    let width = index.values().max().map_or(0, |max| max + 1);
    let mut cells = vec![None; width];
    for (column, value) in row {
        match index.get(column) {
            Some(&i) => cells[i] = Some(value.clone()),
            None => debug!(%column, "layout_row: column not in sheet, dropping"),
        }
    }
    cells
}

/// Normalize a date cell to `YYYY-MM-DD`
///
/// Spreadsheets often re-render typed dates (`3/10/2024`), so both forms map
/// to the same day. Blank cells give `None`; anything else is kept as written.
pub fn normalize_date_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in [DATE_FORMAT, "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(iso_date(date));
        }
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_date_column_found() {
        let index = index_headers(&headers(&["timestamp_submitted", "date", "exercise"]));
        assert_eq!(date_column(&index).unwrap(), 1);
    }

    #[test]
    fn test_date_column_missing() {
        let index = index_headers(&headers(&["day", "exercise"]));
        assert!(matches!(date_column(&index), Err(HabitError::Schema(_))));
    }

    #[test]
    fn test_index_headers_first_duplicate_wins() {
        let index = index_headers(&headers(&["date", "notes", "date"]));
        assert_eq!(index["date"], 0);
    }

    #[test]
    fn test_layout_row_drops_and_blanks() {
        let index = index_headers(&headers(&["date", "exercise", "notes", "reading"]));
        let mut row = Row::new();
        row.insert("date".to_string(), CellValue::from("2024-03-10"));
        row.insert("exercise".to_string(), CellValue::Bool(true));
        row.insert("not_in_sheet".to_string(), CellValue::Bool(false));

        let cells = layout_row(&index, &row);
        assert_eq!(
            cells,
            vec![
                Some(CellValue::from("2024-03-10")),
                Some(CellValue::Bool(true)),
                None,
                None,
            ]
        );
    }

    #[test]
    fn test_normalize_date_cell() {
        assert_eq!(normalize_date_cell("2024-03-10"), Some("2024-03-10".to_string()));
        assert_eq!(normalize_date_cell(" 3/9/2024 "), Some("2024-03-09".to_string()));
        assert_eq!(normalize_date_cell("yesterday"), Some("yesterday".to_string()));
        assert_eq!(normalize_date_cell("   "), None);
    }
}
