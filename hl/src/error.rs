//! Error taxonomy shared by the planner, the store adapters and the session

use thiserror::Error;

/// Errors that can end a habit session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HabitError {
    /// Configuration is unreadable, malformed or inconsistent
    #[error("Config error: {0}")]
    Config(String),

    /// Store unreachable or unauthenticated
    #[error("Connection error: {0}")]
    Connection(String),

    /// Destination table is missing a required column
    #[error("Schema error: {0}")]
    Schema(String),

    /// Timezone name could not be resolved
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Append rejected or failed
    #[error("Store write error: {0}")]
    StoreWrite(String),
}

impl HabitError {
    /// Short machine-friendly name for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            HabitError::Config(_) => "config",
            HabitError::Connection(_) => "connection",
            HabitError::Schema(_) => "schema",
            HabitError::InvalidTimezone(_) => "invalid_timezone",
            HabitError::StoreWrite(_) => "store_write",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_message() {
        let err = HabitError::Schema("required column 'date' missing in sheet".to_string());
        assert_eq!(
            err.to_string(),
            "Schema error: required column 'date' missing in sheet"
        );
    }

    #[test]
    fn test_kind() {
        assert_eq!(HabitError::InvalidTimezone("Mars/Base".to_string()).kind(), "invalid_timezone");
        assert_eq!(HabitError::StoreWrite("x".to_string()).kind(), "store_write");
    }
}
