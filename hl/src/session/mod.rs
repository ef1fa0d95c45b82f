//! Session controller
//!
//! The whole interactive flow is a pure state machine: a [`Session`] value
//! plus a [`SessionEvent`] yields the next `Session` and, at most, one
//! [`Command`] for the caller to run against the store. Command results come
//! back in as [`StoreOutcome`] events. Nothing in here performs I/O; see
//! [`effects`] for the async half.
//!
//! ```text
//! Init ──► CatchUpPrompt ──► DayEntry ──► Review ──► Saving ──► Done
//!   │                          ▲                       │
//!   └──► DayEntry / Done       └───────────────────────┘
//! Init / Saving ──► Error
//! ```

pub mod effects;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::{debug, info, trace, warn};

use crate::config::{Config, HabitConfig};
use crate::error::HabitError;
use crate::planner::MissingDates;
use crate::record::{DateRecord, EntryAnswers};

/// Maximum characters accepted in the notes field
pub const NOTE_CHAR_LIMIT: usize = 200;

/// Controller state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for the schema, dates and plan
    #[default]
    Init,
    /// More than one day is missing; asking whether to back-fill
    CatchUpPrompt,
    /// Answering habits, then typing notes, for the current date
    DayEntry,
    /// Showing the pending record before it is written
    Review,
    /// Waiting for the append to finish
    Saving,
    /// Finished, quit or nothing to do
    Done,
    /// A store or planner failure ended the session
    Error(String),
}

impl Phase {
    /// No transition leaves a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }

    /// Phases with a store call in flight
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Init | Self::Saving)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::CatchUpPrompt => "catch_up_prompt",
            Self::DayEntry => "day_entry",
            Self::Review => "review",
            Self::Saving => "saving",
            Self::Done => "done",
            Self::Error(_) => "error",
        }
    }
}

/// Key input, already decoded from the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Char(char),
    /// Accept / accept default
    Enter,
    Backspace,
    /// Quit immediately without saving
    Interrupt,
}

/// Completion of a store command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Schema checked, dates fetched and plan computed
    MissingDates(MissingDates),
    /// The pending record was appended
    Saved,
    /// A fetch, plan or append failed
    Failed(HabitError),
}

/// Everything the controller reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Input(Input),
    Store(StoreOutcome),
}

impl From<Input> for SessionEvent {
    fn from(input: Input) -> Self {
        Self::Input(input)
    }
}

impl From<StoreOutcome> for SessionEvent {
    fn from(outcome: StoreOutcome) -> Self {
        Self::Store(outcome)
    }
}

/// Store work requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch schema, then existing dates, then plan
    LoadMissingDates,
    /// Append one record
    Append(DateRecord),
}

/// Result of one transition
#[derive(Debug, Clone)]
pub struct Transition {
    pub session: Session,
    pub command: Option<Command>,
}

impl Transition {
    fn stay(session: Session) -> Self {
        Self { session, command: None }
    }

    fn to(session: Session) -> Self {
        Self { session, command: None }
    }

    fn with_command(session: Session, command: Command) -> Self {
        Self {
            session,
            command: Some(command),
        }
    }
}

/// Complete state of one check-in session
#[derive(Debug, Clone)]
pub struct Session {
    config: Arc<Config>,
    phase: Phase,
    missing: MissingDates,
    cursor: usize,
    habit_index: usize,
    answers: EntryAnswers,
    note: String,
    saved: usize,
    interrupted: bool,
}

impl Session {
    /// Fresh session in [`Phase::Init`]
    pub fn new(config: Arc<Config>) -> Self {
        debug!(habits = config.habits.len(), "Session::new: called");
        Self {
            config,
            phase: Phase::Init,
            missing: MissingDates::default(),
            cursor: 0,
            habit_index: 0,
            answers: EntryAnswers::new(),
            note: String::new(),
            saved: 0,
            interrupted: false,
        }
    }

    /// Command to issue on entering the initial phase
    pub fn start(&self) -> Option<Command> {
        match self.phase {
            Phase::Init => Some(Command::LoadMissingDates),
            _ => None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn missing(&self) -> &MissingDates {
        &self.missing
    }

    /// Index into the missing-date queue
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.missing.get(self.cursor)
    }

    pub fn habit_index(&self) -> usize {
        self.habit_index
    }

    /// Habit awaiting an answer, `None` once the notes field is active
    pub fn current_habit(&self) -> Option<&HabitConfig> {
        self.config.habits.get(self.habit_index)
    }

    /// All habits for the current date have been answered
    pub fn habits_answered(&self) -> bool {
        self.habit_index >= self.config.habits.len()
    }

    pub fn answers(&self) -> &EntryAnswers {
        &self.answers
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    /// Days appended so far
    pub fn saved(&self) -> usize {
        self.saved
    }

    /// Ended by the interrupt key
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn last_error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Record that would be written for the current date at `now`
    pub fn pending_record(&self, now: DateTime<FixedOffset>) -> Option<DateRecord> {
        let date = self.current_date()?;
        Some(DateRecord::build(&self.config, date, &self.answers, &self.note, now))
    }

    /// Apply one event
    ///
    /// `now` stamps a record if this transition starts a save.
    pub fn transition(self, event: SessionEvent, now: DateTime<FixedOffset>) -> Transition {
        debug!(phase = self.phase.name(), ?event, "Session::transition: called");
        if self.phase.is_terminal() {
            debug!("Session::transition: terminal phase, ignoring event");
            return Transition::stay(self);
        }

        match event {
            SessionEvent::Input(Input::Interrupt) => self.on_interrupt(),
            SessionEvent::Input(input) => self.on_input(input, now),
            SessionEvent::Store(outcome) => self.on_store(outcome),
        }
    }

    fn on_interrupt(self) -> Transition {
        info!(phase = self.phase.name(), saved = self.saved, "Session interrupted");
        Transition::to(Self {
            phase: Phase::Done,
            interrupted: true,
            ..self
        })
    }

    fn on_store(self, outcome: StoreOutcome) -> Transition {
        match outcome {
            StoreOutcome::MissingDates(missing) if self.phase == Phase::Init => self.on_loaded(missing),
            StoreOutcome::Saved if self.phase == Phase::Saving => self.on_saved(),
            StoreOutcome::Failed(err) if self.phase.is_waiting() => {
                warn!(kind = err.kind(), error = %err, "Store call failed");
                Transition::to(Self {
                    phase: Phase::Error(err.to_string()),
                    ..self
                })
            }
            outcome => {
                warn!(phase = self.phase.name(), ?outcome, "Stale store outcome ignored");
                Transition::stay(self)
            }
        }
    }

    fn on_loaded(self, missing: MissingDates) -> Transition {
        info!(missing = missing.len(), "Missing dates loaded");
        let phase = match missing.len() {
            0 => Phase::Done,
            1 => Phase::DayEntry,
            _ => Phase::CatchUpPrompt,
        };
        Transition::to(Self {
            phase,
            missing,
            cursor: 0,
            ..self.reset_entry()
        })
    }

    fn on_saved(self) -> Transition {
        let cursor = self.cursor + 1;
        let saved = self.saved + 1;
        info!(saved, remaining = self.missing.len().saturating_sub(cursor), "Record saved");

        let phase = if cursor < self.missing.len() {
            Phase::DayEntry
        } else {
            Phase::Done
        };
        Transition::to(Self {
            phase,
            cursor,
            saved,
            ..self.reset_entry()
        })
    }

    fn on_input(self, input: Input, now: DateTime<FixedOffset>) -> Transition {
        match self.phase {
            Phase::CatchUpPrompt => self.on_catch_up_input(input),
            Phase::DayEntry if self.habits_answered() => self.on_note_input(input),
            Phase::DayEntry => self.on_habit_input(input),
            Phase::Review => self.on_review_input(input, now),
            _ => {
                trace!(phase = self.phase.name(), ?input, "Input ignored while waiting");
                Transition::stay(self)
            }
        }
    }

    fn on_catch_up_input(self, input: Input) -> Transition {
        match input {
            Input::Char('y' | 'Y') | Input::Enter => {
                debug!("Session: catch-up accepted");
                Transition::to(Self {
                    phase: Phase::DayEntry,
                    cursor: 0,
                    ..self.reset_entry()
                })
            }
            Input::Char('n' | 'N') => {
                // Only the most recent day gets entered; older gaps stay open
                let cursor = self.missing.len().saturating_sub(1);
                debug!(cursor, "Session: catch-up declined, jumping to latest day");
                Transition::to(Self {
                    phase: Phase::DayEntry,
                    cursor,
                    ..self.reset_entry()
                })
            }
            _ => Transition::stay(self),
        }
    }

    fn on_habit_input(self, input: Input) -> Transition {
        let Some(habit) = self.current_habit() else {
            return Transition::stay(self);
        };

        let value = match input {
            Input::Char('y' | 'Y') => true,
            Input::Char('n' | 'N') => false,
            Input::Enter => habit.default,
            _ => return Transition::stay(self),
        };

        debug!(column = %habit.column, value, "Session: habit answered");
        let column = habit.column.clone();
        let mut answers = self.answers.clone();
        answers.record(column, value);
        Transition::to(Self {
            answers,
            habit_index: self.habit_index + 1,
            ..self
        })
    }

    fn on_note_input(self, input: Input) -> Transition {
        match input {
            Input::Enter => Transition::to(Self {
                phase: Phase::Review,
                ..self
            }),
            Input::Char(c) if !c.is_control() && self.note.chars().count() < NOTE_CHAR_LIMIT => {
                let mut note = self.note.clone();
                note.push(c);
                Transition::to(Self { note, ..self })
            }
            Input::Backspace => {
                let mut note = self.note.clone();
                note.pop();
                Transition::to(Self { note, ..self })
            }
            _ => Transition::stay(self),
        }
    }

    fn on_review_input(self, input: Input, now: DateTime<FixedOffset>) -> Transition {
        if input != Input::Enter {
            return Transition::stay(self);
        }
        let Some(record) = self.pending_record(now) else {
            warn!(cursor = self.cursor, "Review without a current date");
            return Transition::stay(self);
        };

        info!(date = %record.date, "Saving record");
        Transition::with_command(
            Self {
                phase: Phase::Saving,
                ..self
            },
            Command::Append(record),
        )
    }

    /// Clear per-date answers and notes
    fn reset_entry(self) -> Self {
        Self {
            habit_index: 0,
            answers: EntryAnswers::new(),
            note: String::new(),
            ..self
        }
    }
}
