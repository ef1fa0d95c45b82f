//! TUI views and rendering
//!
//! Draws the text from [`crate::view`] inside a header/body/footer layout.
//! Never modifies state.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::trace;

use crate::session::{Phase, Session};
use crate::view;

/// Palette
mod colors {
    use ratatui::style::Color;

    pub const HEADER: Color = Color::Rgb(0, 255, 255); // Cyan
    pub const KEYBIND: Color = Color::Rgb(0, 255, 255); // Cyan
    pub const PROMPT: Color = Color::Rgb(255, 215, 0); // Gold
    pub const SAVED: Color = Color::Rgb(50, 205, 50); // Lime green
    pub const ERROR: Color = Color::Rgb(220, 20, 60); // Crimson
    pub const DIM: Color = Color::DarkGray;
}

fn body_color(phase: &Phase) -> Color {
    match phase {
        Phase::Init | Phase::Saving => colors::DIM,
        Phase::CatchUpPrompt => colors::PROMPT,
        Phase::Done => colors::SAVED,
        Phase::Error(_) => colors::ERROR,
        Phase::DayEntry | Phase::Review => Color::Reset,
    }
}

/// Key hints for the footer
fn keybinds(session: &Session) -> Vec<(&'static str, &'static str)> {
    match session.phase() {
        Phase::CatchUpPrompt => vec![("y/Enter", "catch up"), ("n", "latest day only"), ("Ctrl+C", "quit")],
        Phase::DayEntry if session.habits_answered() => vec![("Enter", "finish notes"), ("Ctrl+C", "quit")],
        Phase::DayEntry => vec![("y", "yes"), ("n", "no"), ("Enter", "default"), ("Ctrl+C", "quit")],
        Phase::Review => vec![("Enter", "save"), ("Ctrl+C", "quit")],
        _ => vec![("Ctrl+C", "quit")],
    }
}

/// Main render function
pub fn render(session: &Session, frame: &mut Frame) {
    trace!(phase = session.phase().name(), "render: called");
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Body
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    render_header(session, frame, chunks[0]);
    render_body(session, frame, chunks[1]);
    render_footer(session, frame, chunks[2]);
}

fn render_header(session: &Session, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::raw(" "),
        Span::styled("habitlog", Style::default().fg(colors::HEADER).add_modifier(Modifier::BOLD)),
        Span::raw(" │ "),
        Span::styled(session.config().sheet_name.clone(), Style::default().fg(colors::DIM)),
    ];
    if let Some(progress) = view::progress(session) {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(progress, Style::default().add_modifier(Modifier::BOLD)));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn render_body(session: &Session, frame: &mut Frame, area: Rect) {
    let text = view::render(session);
    let body = Paragraph::new(text)
        .style(Style::default().fg(body_color(session.phase())))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(body, area);
}

fn render_footer(session: &Session, frame: &mut Frame, area: Rect) {
    let mut spans = Vec::new();
    for (key, action) in keybinds(session) {
        spans.push(Span::styled(format!(" <{}>", key), Style::default().fg(colors::KEYBIND)));
        spans.push(Span::styled(format!(" {}", action), Style::default().fg(colors::DIM)));
    }

    let footer = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}
