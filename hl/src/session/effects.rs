//! Async execution of session commands against a store

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{Command, StoreOutcome};
use crate::error::HabitError;
use crate::planner;
use crate::record::{DATE_COLUMN, DateRecord};
use crate::store::HabitStore;

/// Fetch the schema, then existing dates, then plan against `now`
pub async fn load_missing_dates(store: &dyn HabitStore, timezone: &str, now: DateTime<Utc>) -> StoreOutcome {
    debug!(%timezone, "load_missing_dates: called");
    let result = async {
        let headers = store.fetch_schema().await?;
        if !headers.iter().any(|h| h == DATE_COLUMN) {
            return Err(HabitError::Schema(format!(
                "required column '{}' missing in sheet",
                DATE_COLUMN
            )));
        }

        let existing = store.fetch_existing_dates().await?;
        planner::plan(&existing, timezone, now)
    }
    .await;

    match result {
        Ok(missing) => {
            info!(missing = missing.len(), "Planned missing days");
            StoreOutcome::MissingDates(missing)
        }
        Err(err) => {
            warn!(kind = err.kind(), error = %err, "Loading missing days failed");
            StoreOutcome::Failed(err)
        }
    }
}

/// Append one record
pub async fn append(store: &dyn HabitStore, record: &DateRecord) -> StoreOutcome {
    debug!(date = %record.date, "append: called");
    match store.append_record(&record.to_row()).await {
        Ok(()) => StoreOutcome::Saved,
        Err(err) => {
            warn!(kind = err.kind(), error = %err, "Append failed");
            StoreOutcome::Failed(err)
        }
    }
}

/// Run one command to completion
pub async fn run(command: Command, store: Arc<dyn HabitStore>, timezone: String) -> StoreOutcome {
    match command {
        Command::LoadMissingDates => load_missing_dates(store.as_ref(), &timezone, Utc::now()).await,
        Command::Append(record) => append(store.as_ref(), &record).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::MissingDates;
    use crate::store::{MemoryStore, StoreFailures};
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_load_plans_against_existing() {
        let store = MemoryStore::new(["date", "exercise"]).with_dates(["2024-03-09", "2024-02-25"]);
        let outcome = load_missing_dates(&store, "UTC", now()).await;

        let StoreOutcome::MissingDates(missing) = outcome else {
            panic!("expected missing dates, got {:?}", outcome);
        };
        assert_eq!(missing.len(), 13);
        assert_eq!(missing.first(), NaiveDate::from_ymd_opt(2024, 2, 26));
        assert_eq!(missing.last(), NaiveDate::from_ymd_opt(2024, 3, 10));
    }

    #[tokio::test]
    async fn test_load_requires_date_column() {
        let store = MemoryStore::new(["day", "exercise"]);
        let outcome = load_missing_dates(&store, "UTC", now()).await;
        assert!(matches!(outcome, StoreOutcome::Failed(HabitError::Schema(_))));
    }

    #[tokio::test]
    async fn test_load_connection_failure() {
        let store = MemoryStore::new(["date"]).with_failures(StoreFailures {
            dates: Some(HabitError::Connection("unreachable".to_string())),
            ..Default::default()
        });
        let outcome = load_missing_dates(&store, "UTC", now()).await;
        assert_eq!(
            outcome,
            StoreOutcome::Failed(HabitError::Connection("unreachable".to_string()))
        );
    }

    #[tokio::test]
    async fn test_load_invalid_timezone() {
        let store = MemoryStore::new(["date"]);
        let outcome = load_missing_dates(&store, "Nowhere/Special", now()).await;
        assert!(matches!(outcome, StoreOutcome::Failed(HabitError::InvalidTimezone(_))));
    }

    #[tokio::test]
    async fn test_load_all_caught_up() {
        let days: Vec<String> = (0..15)
            .map(|i| format!("2024-03-{:02}", i + 1))
            .chain((25..=29).map(|d| format!("2024-02-{}", d)))
            .collect();
        let store = MemoryStore::new(["date"]).with_dates(days);
        let outcome = load_missing_dates(&store, "UTC", now()).await;
        assert_eq!(outcome, StoreOutcome::MissingDates(MissingDates::default()));
    }

    #[tokio::test]
    async fn test_run_append() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new(["date", "notes"]));
        let config = crate::config::Config::new("s", "Daily", vec![]);
        let record = DateRecord::build(
            &config,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            &Default::default(),
            "quiet day",
            now().fixed_offset(),
        );

        let outcome = run(Command::Append(record), store.clone(), "UTC".to_string()).await;
        assert_eq!(outcome, StoreOutcome::Saved);

        let rows = store.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["notes"].to_string(), "quiet day");
    }
}
