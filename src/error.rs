//! Error types for pastel-engagement

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngagementError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngagementError>;

impl EngagementError {
    /// Shorthand for a missing row of the given kind
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} {} does not exist", kind, id))
    }

    /// Reject a negative limit/window before any query runs
    pub fn check_non_negative(name: &str, value: i64) -> Result<()> {
        if value < 0 {
            return Err(Self::InvalidInput(format!(
                "{} must be >= 0, got {}",
                name, value
            )));
        }
        Ok(())
    }
}
