//! TUI application - key decoding and session ownership
//!
//! The App owns the current [`Session`] and swaps in the result of every
//! transition. It does not do any rendering or I/O; commands it returns are
//! run by the runner.

use std::sync::Arc;

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, trace};

use crate::config::Config;
use crate::session::{Command, Input, Session, SessionEvent, StoreOutcome, Transition};

/// Decode a key press into session input
///
/// Ctrl+C is the interrupt; other control chords are dropped.
pub fn decode_key(key: KeyEvent) -> Option<Input> {
    match (key.code, key.modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Input::Interrupt),
        (KeyCode::Char(_), m) if m.contains(KeyModifiers::CONTROL) || m.contains(KeyModifiers::ALT) => None,
        (KeyCode::Char(c), _) => Some(Input::Char(c)),
        (KeyCode::Enter, _) => Some(Input::Enter),
        (KeyCode::Backspace, _) => Some(Input::Backspace),
        _ => None,
    }
}

/// TUI application
#[derive(Debug)]
pub struct App {
    session: Session,
}

impl App {
    pub fn new(config: Arc<Config>) -> Self {
        debug!("App::new: called");
        Self {
            session: Session::new(config),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Command for the initial phase
    pub fn start(&self) -> Option<Command> {
        self.session.start()
    }

    /// The session reached `Done` or `Error`
    pub fn should_quit(&self) -> bool {
        self.session.phase().is_terminal()
    }

    /// Handle a key event
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        debug!(?key, "App::handle_key: called");
        match decode_key(key) {
            Some(input) => self.dispatch(input.into()),
            None => {
                trace!("App::handle_key: key not mapped");
                None
            }
        }
    }

    /// Feed back the result of the outstanding command
    pub fn handle_outcome(&mut self, outcome: StoreOutcome) -> Option<Command> {
        self.dispatch(outcome.into())
    }

    fn dispatch(&mut self, event: SessionEvent) -> Option<Command> {
        let Transition { session, command } = self.session.clone().transition(event, Local::now().fixed_offset());
        self.session = session;
        command
    }
}
