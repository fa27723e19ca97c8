// src/error.rs
//! Error types for the run tracker

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The platform refused location access. Fatal to the session start.
    #[error("Location permission denied: {0}")]
    PermissionDenied(String),

    /// No usable fix this time around. Transient.
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("No user is signed in")]
    NotAuthenticated,

    #[error("Failed to write run record: {0}")]
    WriteError(String),

    #[error("Cannot {action} while session is {from}")]
    InvalidTransition {
        from: crate::tracker::SessionStatus,
        action: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[cfg(windows)]
    #[error("Windows error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("Error: {0}")]
    Other(String),
}

impl TrackerError {
    /// Whether the error only affects a single tick and the session can carry on.
    pub fn is_transient(&self) -> bool {
        matches!(self, TrackerError::LocationUnavailable(_))
    }
}

impl From<anyhow::Error> for TrackerError {
    fn from(error: anyhow::Error) -> Self {
        TrackerError::Other(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::SessionStatus;

    #[test]
    fn test_transition_message() {
        let err = TrackerError::InvalidTransition {
            from: SessionStatus::Running,
            action: "confirm stop",
        };
        assert_eq!(err.to_string(), "Cannot confirm stop while session is Running");
    }

    #[test]
    fn test_only_missing_fix_is_transient() {
        assert!(TrackerError::LocationUnavailable("timeout".to_string()).is_transient());
        assert!(!TrackerError::PermissionDenied("denied".to_string()).is_transient());
        assert!(!TrackerError::NotAuthenticated.is_transient());
    }
}
