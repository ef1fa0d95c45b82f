//! In-memory store
//!
//! Behaves like a sheet with a header row: appends are laid out along the
//! headers with the same drop/blank rules as the remote store. Failures can
//! be injected per operation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{HabitStore, HeaderIndex, date_column, index_headers, layout_row, normalize_date_cell};
use crate::error::HabitError;
use crate::record::{CellValue, DATE_COLUMN, Row};

/// Failures to inject into a [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct StoreFailures {
    /// Returned by every `fetch_schema` call
    pub schema: Option<HabitError>,
    /// Returned by every `fetch_existing_dates` call
    pub dates: Option<HabitError>,
    /// Zero-based append call that fails with a write error
    pub append_at: Option<usize>,
}

/// Sheet-shaped store kept in memory
pub struct MemoryStore {
    headers: Vec<String>,
    index: Mutex<Option<HeaderIndex>>,
    rows: Mutex<Vec<Vec<Option<CellValue>>>>,
    failures: StoreFailures,
    append_calls: AtomicUsize,
}

impl MemoryStore {
    /// Empty sheet with the given header row
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        debug!(?headers, "MemoryStore::new: called");
        Self {
            headers,
            index: Mutex::new(None),
            rows: Mutex::new(Vec::new()),
            failures: StoreFailures::default(),
            append_calls: AtomicUsize::new(0),
        }
    }

    /// Seed rows that only carry a date
    pub fn with_dates<I, S>(mut self, dates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = index_headers(&self.headers);
        for date in dates {
            let mut row = Row::new();
            row.insert(DATE_COLUMN.to_string(), CellValue::Text(date.into()));
            let cells = layout_row(&index, &row);
            self.rows.get_mut().push(cells);
        }
        self
    }

    pub fn with_failures(mut self, failures: StoreFailures) -> Self {
        self.failures = failures;
        self
    }

    /// Number of append calls made, failed ones included
    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    /// Every stored row as column to value, blank cells omitted
    pub async fn rows(&self) -> Vec<Row> {
        let rows = self.rows.lock().await;
        rows.iter()
            .map(|cells| {
                self.headers
                    .iter()
                    .zip(cells.iter())
                    .filter_map(|(header, cell)| cell.clone().map(|value| (header.clone(), value)))
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl HabitStore for MemoryStore {
    async fn fetch_schema(&self) -> Result<Vec<String>, HabitError> {
        debug!("MemoryStore::fetch_schema: called");
        if let Some(err) = &self.failures.schema {
            return Err(err.clone());
        }
        if self.headers.is_empty() {
            return Err(HabitError::Schema("sheet is empty".to_string()));
        }
        *self.index.lock().await = Some(index_headers(&self.headers));
        Ok(self.headers.clone())
    }

    async fn fetch_existing_dates(&self) -> Result<HashSet<String>, HabitError> {
        debug!("MemoryStore::fetch_existing_dates: called");
        if let Some(err) = &self.failures.dates {
            return Err(err.clone());
        }
        let col = match self.index.lock().await.as_ref() {
            Some(index) => date_column(index)?,
            None => return Err(HabitError::Schema("schema has not been fetched".to_string())),
        };

        let rows = self.rows.lock().await;
        let dates = rows
            .iter()
            .filter_map(|cells| match cells.get(col) {
                Some(Some(CellValue::Text(text))) => normalize_date_cell(text),
                _ => None,
            })
            .collect();
        Ok(dates)
    }

    async fn append_record(&self, row: &Row) -> Result<(), HabitError> {
        let call = self.append_calls.fetch_add(1, Ordering::SeqCst);
        debug!(call, columns = row.len(), "MemoryStore::append_record: called");
        if self.failures.append_at == Some(call) {
            return Err(HabitError::StoreWrite(format!("append #{} rejected", call)));
        }

        let index = index_headers(&self.headers);
        let cells = layout_row(&index, row);
        self.rows.lock().await.push(cells);
        Ok(())
    }
}
