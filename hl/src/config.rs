//! habitlog configuration types and loading
//!
//! The config lives at `<config_dir>/habitlog/config.yaml` (`~/.config` on
//! Linux). There are no command-line overrides.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::HabitError;
use crate::planner::SessionTimezone;
use crate::record::FIXED_COLUMNS;

/// Timezone used when the config does not name one
pub const DEFAULT_TIMEZONE: &str = "Local";

/// Main habitlog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Google Sheets spreadsheet ID (from the sheet URL)
    pub spreadsheet_id: String,

    /// Tab inside the spreadsheet that holds one row per day
    pub sheet_name: String,

    /// IANA timezone name, or `Local` for the system zone
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Credentials for the Sheets API
    #[serde(default)]
    pub auth: AuthConfig,

    /// Habits in prompt order
    #[serde(default)]
    pub habits: Vec<HabitConfig>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

/// A single yes/no question tied to one sheet column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitConfig {
    pub id: String,
    pub label: String,
    pub column: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub help: String,
}

impl HabitConfig {
    pub fn new(id: impl Into<String>, label: impl Into<String>, column: impl Into<String>, default: bool) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            column: column.into(),
            default,
            help: String::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }
}

/// How the store authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// `key_path` points at a service account key JSON
    #[default]
    ServiceAccount,
    /// `key_path` points at a file holding an OAuth bearer token
    AccessToken,
}

/// Sheets API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,

    /// Path to the credentials file, `~/` is expanded
    #[serde(default)]
    pub key_path: String,
}

impl AuthConfig {
    /// Expand `~/` against the home directory
    pub fn expanded_key_path(&self) -> PathBuf {
        debug!(key_path = %self.key_path, "AuthConfig::expanded_key_path: called");
        match self.key_path.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.key_path)),
            None => PathBuf::from(&self.key_path),
        }
    }
}

impl Config {
    /// Build a config in code (tests, embedding)
    pub fn new(spreadsheet_id: impl Into<String>, sheet_name: impl Into<String>, habits: Vec<HabitConfig>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            timezone: default_timezone(),
            auth: AuthConfig::default(),
            habits,
            log_level: None,
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Fixed location of the config file
    pub fn default_path() -> Result<PathBuf, HabitError> {
        dirs::config_dir()
            .map(|dir| dir.join("habitlog").join("config.yaml"))
            .ok_or_else(|| HabitError::Config("could not determine config directory".to_string()))
    }

    /// Load and validate the config from its fixed location
    pub fn load() -> Result<Self, HabitError> {
        let path = Self::default_path()?;
        Self::load_from_file(&path)
    }

    /// Load and validate the config from an explicit file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, HabitError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Config::load_from_file: called");
        let content = fs::read_to_string(path)
            .map_err(|e| HabitError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_yaml(&content)?;
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(content: &str) -> Result<Self, HabitError> {
        let mut config: Self =
            serde_yaml::from_str(content).map_err(|e| HabitError::Config(format!("failed to parse config: {}", e)))?;

        if config.timezone.trim().is_empty() {
            config.timezone = default_timezone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Read only the log level, ignoring every other problem
    ///
    /// Logging is set up before the full config is validated, so a broken
    /// config must still be able to report where it broke.
    pub fn load_log_level() -> Option<String> {
        #[derive(Deserialize)]
        struct LogLevelOnly {
            log_level: Option<String>,
        }

        let path = Self::default_path().ok()?;
        let content = fs::read_to_string(path).ok()?;
        serde_yaml::from_str::<LogLevelOnly>(&content).ok()?.log_level
    }

    /// Validate configuration before use
    pub fn validate(&self) -> Result<(), HabitError> {
        debug!(habits = self.habits.len(), "Config::validate: called");
        if self.spreadsheet_id.trim().is_empty() {
            return Err(HabitError::Config("spreadsheet_id is empty".to_string()));
        }
        if self.sheet_name.trim().is_empty() {
            return Err(HabitError::Config("sheet_name is empty".to_string()));
        }
        if self.habits.is_empty() {
            return Err(HabitError::Config("no habits configured".to_string()));
        }

        let mut seen = HashSet::new();
        for habit in &self.habits {
            if habit.column.trim().is_empty() {
                return Err(HabitError::Config(format!("habit '{}' has an empty column", habit.id)));
            }
            if FIXED_COLUMNS.contains(&habit.column.as_str()) {
                return Err(HabitError::Config(format!(
                    "habit '{}' uses reserved column '{}'",
                    habit.id, habit.column
                )));
            }
            if !seen.insert(habit.column.as_str()) {
                return Err(HabitError::Config(format!("column '{}' is used by more than one habit", habit.column)));
            }
        }

        // Surface a bad timezone at startup rather than mid-session
        self.session_timezone()?;
        Ok(())
    }

    /// Resolve the configured timezone
    pub fn session_timezone(&self) -> Result<SessionTimezone, HabitError> {
        SessionTimezone::parse(&self.timezone)
    }
}
