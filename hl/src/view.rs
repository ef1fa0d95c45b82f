//! Plain-text rendering of a session
//!
//! Pure functions from [`Session`] to display text. The TUI draws this text;
//! tests read it directly.

use crate::planner::iso_date;
use crate::record::CellValue;
use crate::session::{Phase, Session};

fn yes_no(value: bool) -> &'static str {
    if value { "y" } else { "n" }
}

fn answer_text(value: Option<&CellValue>) -> String {
    match value.map(|v| (v.as_bool(), v)) {
        Some((Some(true), _)) => "yes".to_string(),
        Some((Some(false), _)) => "no".to_string(),
        Some((None, text)) => text.to_string(),
        None => "-".to_string(),
    }
}

/// Body text for the current phase
pub fn render(session: &Session) -> String {
    let date = session.current_date().map(iso_date).unwrap_or_default();

    match session.phase() {
        Phase::Init => "Connecting to Google Sheets...\n".to_string(),
        Phase::CatchUpPrompt => {
            let missing = session.missing();
            format!(
                "Missing {} days ({} to {}). Start catch-up? (Y/n)\n",
                missing.len(),
                missing.first().map(iso_date).unwrap_or_default(),
                missing.last().map(iso_date).unwrap_or_default(),
            )
        }
        Phase::DayEntry => match session.current_habit() {
            Some(habit) => {
                let mut text = format!(
                    "Date: {}\n\n{}? [y/n] (default: {})\n",
                    date,
                    habit.label,
                    yes_no(habit.default)
                );
                if !habit.help.is_empty() {
                    text.push_str(&format!("  {}\n", habit.help));
                }
                text
            }
            None => format!("Date: {}\n\nNotes: {}\n(Enter to finish)", date, session.note()),
        },
        Phase::Review => {
            let mut text = format!("Review for {}:\n", date);
            for habit in &session.config().habits {
                text.push_str(&format!(
                    "- {}: {}\n",
                    habit.label,
                    answer_text(session.answers().get(&habit.column))
                ));
            }
            text.push_str(&format!(
                "Notes: {}\n\nSave to Sheet? (Enter to save, Ctrl+C to quit)",
                session.note()
            ));
            text
        }
        Phase::Saving => "Saving...".to_string(),
        Phase::Done => summary(session),
        Phase::Error(message) => format!("Error: {}\n", message),
    }
}

/// Closing line for a finished session
pub fn summary(session: &Session) -> String {
    if session.interrupted() {
        format!("Quit. Saved {} day(s).\n", session.saved())
    } else if session.missing().is_empty() {
        "All caught up!\n".to_string()
    } else {
        format!("Done! Saved {} day(s).\n", session.saved())
    }
}

/// "Day i of n" while working through the queue
pub fn progress(session: &Session) -> Option<String> {
    match session.phase() {
        Phase::DayEntry | Phase::Review | Phase::Saving => Some(format!(
            "Day {} of {}",
            session.cursor() + 1,
            session.missing().len()
        )),
        _ => None,
    }
}
