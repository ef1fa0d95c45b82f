//! TUI Runner - main loop that owns the terminal and the store task
//!
//! The TuiRunner is responsible for:
//! - Drawing the current session every loop
//! - Feeding key events and store results to the App, one at a time
//! - Running at most one store command in the background
//! - Dropping any in-flight command when the session ends

use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Tui;
use super::app::App;
use super::events::{Event, EventHandler};
use super::views;
use crate::config::Config;
use crate::error::HabitError;
use crate::session::{Command, Session, StoreOutcome, effects};
use crate::store::HabitStore;

/// Redraw interval when no input arrives
const TICK_RATE: Duration = Duration::from_millis(250);

/// TUI Runner that manages the terminal and event loop
pub struct TuiRunner {
    /// Application state
    app: App,
    /// Terminal handle
    terminal: Tui,
    /// Event handler
    event_handler: EventHandler,
    /// Store the session reads from and appends to
    store: Arc<dyn HabitStore>,
    /// Timezone name handed to the planner
    timezone: String,
    /// Receiver for the outstanding command's result
    outcome_rx: Option<mpsc::Receiver<StoreOutcome>>,
    /// Handle to the outstanding command
    store_task: Option<JoinHandle<()>>,
}

impl TuiRunner {
    pub fn new(terminal: Tui, config: Arc<Config>, store: Arc<dyn HabitStore>) -> Self {
        debug!("TuiRunner::new: called");
        let timezone = config.timezone.clone();
        Self {
            app: App::new(config),
            terminal,
            event_handler: EventHandler::new(TICK_RATE),
            store,
            timezone,
            outcome_rx: None,
            store_task: None,
        }
    }

    /// Run until the session ends, returning its final state
    pub async fn run(mut self) -> Result<Session> {
        debug!("TuiRunner::run: called");
        if let Some(command) = self.app.start() {
            self.spawn_command(command);
        }

        loop {
            self.terminal.draw(|frame| views::render(self.app.session(), frame))?;

            if self.app.should_quit() {
                debug!("TuiRunner::run: session finished, breaking");
                break;
            }

            tokio::select! {
                event = self.event_handler.next() => {
                    match event? {
                        Event::Key(key) => {
                            if let Some(command) = self.app.handle_key(key) {
                                self.spawn_command(command);
                            }
                        }
                        Event::Resize(width, height) => {
                            debug!(width, height, "TuiRunner::run: resize");
                        }
                        Event::Tick => {}
                    }
                }
                outcome = next_outcome(&mut self.outcome_rx) => {
                    self.outcome_rx = None;
                    self.store_task = None;
                    if let Some(command) = self.app.handle_outcome(outcome) {
                        self.spawn_command(command);
                    }
                }
            }
        }

        if let Some(task) = self.store_task.take() {
            info!("Discarding in-flight store command");
            task.abort();
        }

        debug!("TuiRunner::run: exiting");
        Ok(self.app.into_session())
    }

    /// Start a command in the background
    fn spawn_command(&mut self, command: Command) {
        debug!(?command, "TuiRunner::spawn_command: called");
        if self.store_task.is_some() {
            warn!("Store command already in flight, dropping new command");
            return;
        }

        let (tx, rx) = mpsc::channel::<StoreOutcome>(1);
        let store = Arc::clone(&self.store);
        let timezone = self.timezone.clone();

        self.outcome_rx = Some(rx);
        self.store_task = Some(tokio::spawn(async move {
            let outcome = effects::run(command, store, timezone).await;
            if tx.send(outcome).await.is_err() {
                debug!("Store command finished after the session ended");
            }
        }));
    }
}

/// Wait for the outstanding command, or forever if there is none
async fn next_outcome(rx: &mut Option<mpsc::Receiver<StoreOutcome>>) -> StoreOutcome {
    match rx {
        Some(rx) => rx.recv().await.unwrap_or_else(|| {
            StoreOutcome::Failed(HabitError::Connection(
                "store task stopped without a result".to_string(),
            ))
        }),
        None => std::future::pending().await,
    }
}
