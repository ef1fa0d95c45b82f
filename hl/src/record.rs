//! Typed answers and the per-day record written to the store

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::planner::iso_date;

pub const DATE_COLUMN: &str = "date";
pub const NOTES_COLUMN: &str = "notes";
pub const TIMESTAMP_COLUMN: &str = "timestamp_submitted";
pub const TIMEZONE_COLUMN: &str = "timezone";

/// Columns every record carries regardless of configured habits
pub const FIXED_COLUMNS: [&str; 4] = [DATE_COLUMN, NOTES_COLUMN, TIMESTAMP_COLUMN, TIMEZONE_COLUMN];

/// A single cell value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Text(String),
}

impl CellValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Column name to value, as handed to the store
pub type Row = BTreeMap<String, CellValue>;

/// Habit answers for the day being entered, in answer order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryAnswers {
    values: Vec<(String, CellValue)>,
}

impl EntryAnswers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer, replacing any earlier answer for the column
    pub fn record(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        let column = column.into();
        let value = value.into();
        match self.values.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.values.iter().map(|(c, v)| (c.as_str(), v))
    }
}

/// One persisted row for a single calendar day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRecord {
    pub date: NaiveDate,
    pub answers: EntryAnswers,
    pub notes: String,
    pub submitted_at: DateTime<FixedOffset>,
    pub timezone: String,
}

impl DateRecord {
    /// Build the record for `date` from the answers given during entry
    ///
    /// Answers are taken in habit order. Columns that are not configured
    /// habits are dropped.
    pub fn build(
        config: &Config,
        date: NaiveDate,
        answers: &EntryAnswers,
        notes: &str,
        submitted_at: DateTime<FixedOffset>,
    ) -> Self {
        debug!(%date, answers = answers.len(), "DateRecord::build: called");
        let mut ordered = EntryAnswers::new();
        for habit in &config.habits {
            let value = match answers.get(&habit.column) {
                Some(value) => value.clone(),
                None => {
                    warn!(%date, column = %habit.column, "Habit unanswered at save, using its default");
                    CellValue::Bool(habit.default)
                }
            };
            ordered.record(habit.column.clone(), value);
        }

        Self {
            date,
            answers: ordered,
            notes: notes.to_string(),
            submitted_at,
            timezone: config.timezone.clone(),
        }
    }

    /// Submission time in RFC 3339
    pub fn timestamp(&self) -> String {
        self.submitted_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Column mapping for the store: habit columns plus the fixed fields
    pub fn to_row(&self) -> Row {
        let mut row: Row = self
            .answers
            .iter()
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect();
        row.insert(DATE_COLUMN.to_string(), CellValue::Text(iso_date(self.date)));
        row.insert(NOTES_COLUMN.to_string(), CellValue::Text(self.notes.clone()));
        row.insert(TIMESTAMP_COLUMN.to_string(), CellValue::Text(self.timestamp()));
        row.insert(TIMEZONE_COLUMN.to_string(), CellValue::Text(self.timezone.clone()));
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HabitConfig;
    use chrono::TimeZone;

    fn config() -> Config {
        Config::new(
            "sheet",
            "Daily",
            vec![
                HabitConfig::new("exercise", "Exercised", "exercise", true),
                HabitConfig::new("read", "Read", "reading", false),
            ],
        )
        .with_timezone("Europe/Berlin")
    }

    fn submitted() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 10, 21, 15, 0)
            .unwrap()
    }

    #[test]
    fn test_record_replaces_existing_answer() {
        let mut answers = EntryAnswers::new();
        answers.record("exercise", true);
        answers.record("exercise", false);

        assert_eq!(answers.len(), 1);
        assert_eq!(answers.get("exercise"), Some(&CellValue::Bool(false)));
    }

    #[test]
    fn test_to_row_has_habits_and_fixed_columns() {
        let mut answers = EntryAnswers::new();
        answers.record("reading", true);
        answers.record("exercise", false);

        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let record = DateRecord::build(&config(), date, &answers, "long walk", submitted());
        let row = record.to_row();

        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(
            columns,
            vec!["date", "exercise", "notes", "reading", "timestamp_submitted", "timezone"]
        );
        assert_eq!(row["date"], CellValue::Text("2024-03-10".to_string()));
        assert_eq!(row["exercise"], CellValue::Bool(false));
        assert_eq!(row["reading"], CellValue::Bool(true));
        assert_eq!(row["notes"], CellValue::Text("long walk".to_string()));
        assert_eq!(row["timestamp_submitted"], CellValue::Text("2024-03-10T21:15:00+01:00".to_string()));
        assert_eq!(row["timezone"], CellValue::Text("Europe/Berlin".to_string()));
    }

    #[test]
    fn test_build_orders_by_habit_and_drops_unknown_columns() {
        let mut answers = EntryAnswers::new();
        answers.record("reading", false);
        answers.record("stray", true);
        answers.record("exercise", true);

        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let record = DateRecord::build(&config(), date, &answers, "", submitted());

        let columns: Vec<&str> = record.answers.columns().collect();
        assert_eq!(columns, vec!["exercise", "reading"]);
    }

    #[test]
    fn test_build_fills_unanswered_habit_with_default() {
        let mut answers = EntryAnswers::new();
        answers.record("exercise", false);

        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let record = DateRecord::build(&config(), date, &answers, "", submitted());

        assert_eq!(record.answers.len(), 2);
        assert_eq!(record.answers.get("exercise"), Some(&CellValue::Bool(false)));
        assert_eq!(record.answers.get("reading"), Some(&CellValue::Bool(false)));

        let record = DateRecord::build(&config(), date, &EntryAnswers::new(), "", submitted());
        assert_eq!(record.answers.get("exercise"), Some(&CellValue::Bool(true)));
    }

    #[test]
    fn test_cell_value_serializes_untagged() {
        assert_eq!(serde_json::to_value(CellValue::Bool(true)).unwrap(), serde_json::json!(true));
        assert_eq!(serde_json::to_value(CellValue::from("hi")).unwrap(), serde_json::json!("hi"));
    }

    #[test]
    fn test_cell_value_accessors() {
        assert_eq!(CellValue::Bool(true).as_bool(), Some(true));
        assert_eq!(CellValue::from("x").as_bool(), None);
        assert_eq!(CellValue::Bool(false).to_string(), "false");
    }
}
