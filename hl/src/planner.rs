//! Missing-day planner
//!
//! Works out which calendar days in the lookback window have no row in the
//! store yet. The window is today plus the [`LOOKBACK_DAYS`] days before it,
//! where "today" is taken in the session's timezone.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::error::HabitError;

/// Days before today that are checked for gaps
pub const LOOKBACK_DAYS: u64 = 14;

/// Day format used in the store's `date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a day the way the store expects it
pub fn iso_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Timezone that anchors "today"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTimezone {
    /// The system's local zone
    Local,
    /// A named IANA zone
    Named(Tz),
}

impl SessionTimezone {
    /// Resolve `Local` or an IANA name such as `Europe/Berlin`
    pub fn parse(name: &str) -> Result<Self, HabitError> {
        debug!(%name, "SessionTimezone::parse: called");
        let trimmed = name.trim();
        if trimmed.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        trimmed
            .parse::<Tz>()
            .map(Self::Named)
            .map_err(|e| HabitError::InvalidTimezone(format!("'{}': {}", name, e)))
    }

    /// Calendar day of `now` in this zone
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Local => now.with_timezone(&chrono::Local).date_naive(),
            Self::Named(tz) => now.with_timezone(tz).date_naive(),
        }
    }
}

impl fmt::Display for SessionTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "Local"),
            Self::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

/// Days that need an entry, oldest first
///
/// Strictly ascending with no duplicates. Computed once per session and only
/// indexed after that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingDates(Vec<NaiveDate>);

impl MissingDates {
    /// Build from any list of days, sorting and dropping duplicates
    pub fn new(mut dates: Vec<NaiveDate>) -> Self {
        dates.sort_unstable();
        dates.dedup();
        Self(dates)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NaiveDate> {
        self.0.get(index).copied()
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.0.last().copied()
    }

    pub fn as_slice(&self) -> &[NaiveDate] {
        &self.0
    }

    /// ISO strings, in queue order
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().copied().map(iso_date).collect()
    }
}

/// Days in the window ending at `now`'s local day that are absent from `existing`
pub fn missing_days_at(existing: &HashSet<String>, timezone: SessionTimezone, now: DateTime<Utc>) -> MissingDates {
    let today = timezone.today(now);
    debug!(%today, %timezone, existing = existing.len(), "missing_days_at: called");

    let missing = (0..=LOOKBACK_DAYS)
        .rev()
        .filter_map(|offset| today.checked_sub_days(Days::new(offset)))
        .filter(|day| !existing.contains(&iso_date(*day)))
        .collect();

    // Already ascending and unique, new() keeps the invariant explicit
    MissingDates::new(missing)
}

/// Resolve `timezone` and plan against a fixed instant
pub fn plan(existing: &HashSet<String>, timezone: &str, now: DateTime<Utc>) -> Result<MissingDates, HabitError> {
    let tz = SessionTimezone::parse(timezone)?;
    Ok(missing_days_at(existing, tz, now))
}

/// Resolve `timezone` and plan against the current time
pub fn missing_days(existing: &HashSet<String>, timezone: &str) -> Result<MissingDates, HabitError> {
    plan(existing, timezone, Utc::now())
}
