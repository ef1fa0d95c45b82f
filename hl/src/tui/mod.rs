//! Terminal User Interface for habitlog
//!
//! Full-screen check-in flow:
//! - Catch-up prompt when several days are missing
//! - One y/n question per habit, then free-text notes
//! - Review and save, one day at a time

mod app;
mod events;
mod runner;
mod views;

pub use app::{App, decode_key};
pub use events::{Event, EventHandler};
pub use runner::TuiRunner;

use std::io::{self, Stdout};
use std::sync::Arc;

use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use eyre::Result;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::config::Config;
use crate::session::Session;
use crate::store::HabitStore;

/// Terminal type alias
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Initialize the terminal for TUI mode
pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to normal mode
pub fn restore() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

/// Run one check-in session against `store`
///
/// The terminal is restored before this returns, so the caller can print.
pub async fn run(config: Arc<Config>, store: Arc<dyn HabitStore>) -> Result<Session> {
    let terminal = init()?;

    // Use a guard to ensure terminal is restored even on early return/error
    struct TerminalGuard;
    impl Drop for TerminalGuard {
        fn drop(&mut self) {
            let _ = restore();
        }
    }
    let _guard = TerminalGuard;

    TuiRunner::new(terminal, config, store).run().await
}
