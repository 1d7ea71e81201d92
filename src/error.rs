//! Error types for cabinet.

use thiserror::Error;

/// Common error type for cabinet.
#[derive(Error, Debug)]
pub enum CabinetError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Permission denied error.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The operation clashes with existing data (duplicate names, usernames).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Building a ZIP archive failed.
    #[error("archive error: {0}")]
    Archive(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for CabinetError {
    fn from(e: sqlx::Error) -> Self {
        CabinetError::Database(e.to_string())
    }
}

impl From<zip::result::ZipError> for CabinetError {
    fn from(e: zip::result::ZipError) -> Self {
        CabinetError::Archive(e.to_string())
    }
}

/// Result type alias for cabinet operations.
pub type Result<T> = std::result::Result<T, CabinetError>;
