//! Error types for the overlap scanner

use std::time::Duration;
use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the scanner
#[derive(Error, Debug)]
pub enum Error {
    // Request errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Session errors (abort the whole scan)
    #[error("Session error: {0}")]
    Session(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error was raised before any work started
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::Config(_))
    }
}

/// Failure of a single token's fetch.
///
/// Always contained to that token: it degrades the token's result to an
/// empty wallet list and never aborts the scan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("scan timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    ExternalFailure(String),

    #[error("scan cancelled")]
    Cancelled,
}

impl ScanError {
    /// Check if the fetch ran out of time rather than failing outright
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScanError::Timeout(_))
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
