//! habitlog - daily habit check-in backed by Google Sheets
//!
//! Each run compares the last two weeks against the rows already in the
//! sheet, then walks the user through any missing days: one y/n question per
//! habit, a free-text note, a review screen, and an append.
//!
//! # Modules
//!
//! - [`planner`] - which days in the lookback window still need a row
//! - [`session`] - the check-in state machine and its store effects
//! - [`store`] - store trait, Google Sheets client and in-memory store
//! - [`view`] - plain-text rendering of a session
//! - [`tui`] - terminal front-end
//! - [`config`] - configuration types and loading

pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod record;
pub mod session;
pub mod store;
pub mod tui;
pub mod view;

// Re-export commonly used types
pub use config::{AuthConfig, AuthMode, Config, HabitConfig};
pub use error::HabitError;
pub use planner::{LOOKBACK_DAYS, MissingDates, SessionTimezone, missing_days, missing_days_at};
pub use record::{CellValue, DateRecord, EntryAnswers, Row};
pub use session::{Command, Input, Phase, Session, SessionEvent, StoreOutcome, Transition};
pub use store::{Credentials, HabitStore, MemoryStore, ServiceAccount, SheetsStore, StoreFailures};
