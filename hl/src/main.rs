//! habitlog - daily habit check-in
//!
//! Entry point: load config, connect the store, run the TUI, print a summary.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use habitlog::cli::Cli;
use habitlog::config::Config;
use habitlog::session::Phase;
use habitlog::store::SheetsStore;
use habitlog::{tui, view};

/// Map a level name to a tracing level
fn parse_level(name: &str) -> Option<tracing::Level> {
    match name.to_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" | "WARNING" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

fn setup_logging(config_log_level: Option<&str>) -> Result<()> {
    // The terminal belongs to the TUI, so logs go to a file
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("habitlog")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: config file > default (INFO)
    let level = match config_log_level {
        Some(s) => parse_level(s).unwrap_or_else(|| {
            eprintln!("Warning: Unknown log_level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }),
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("habitlog.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level();
    setup_logging(config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        sheet = %config.sheet_name,
        habits = config.habits.len(),
        timezone = %config.timezone,
        "habitlog loaded config"
    );

    let store = SheetsStore::from_config(&config).context("Failed to connect to Google Sheets")?;

    let session = tui::run(Arc::new(config), Arc::new(store)).await?;
    debug!(phase = session.phase().name(), saved = session.saved(), "main: session ended");

    match session.phase() {
        Phase::Error(message) => {
            warn!(%message, "Session ended with error");
            eprintln!("{} {}", "Error:".red().bold(), message);
            Ok(ExitCode::FAILURE)
        }
        _ => {
            println!("{}", view::summary(&session).trim_end().green());
            Ok(ExitCode::SUCCESS)
        }
    }
}
