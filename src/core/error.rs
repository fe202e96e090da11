//! Error types for the holding verification tool
//!
//! This module defines the error types used throughout the application.
//! Failures that belong to a single file (unreadable, vanished) are not
//! errors here; they travel as [`FileError`](crate::fixity::FileError) values
//! attached to that file's outcome.

use crate::core::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the holding verification tool
#[derive(Error, Debug)]
pub enum VerifyError {
    /// General I/O error
    #[error("IO error: {0}")]
    IoError(String),

    /// The reference fixity table could not be opened or queried
    #[error("Reference table lookup failed: {0}")]
    LookupError(#[from] rusqlite::Error),

    /// The configured table name is not a plain SQL identifier
    #[error("Invalid reference table name '{0}': only letters, digits and '_' are allowed")]
    InvalidTableName(String),

    /// The reference database file is missing
    #[error("Checksum database '{}' is missing", .0.display())]
    DatabaseMissing(PathBuf),

    /// The paths to verify are unusable (missing, or files mixed with folders)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reading a fixity CSV export failed
    #[error("Failed to read fixity CSV '{}': {message}", path.display())]
    ImportError { path: PathBuf, message: String },

    /// A report row could not be written
    #[error("Failed to write report '{}': {message}", path.display())]
    ReportError { path: PathBuf, message: String },

    /// Configuration could not be loaded or saved
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Reading an interactive answer failed
    #[error("Failed to read input: {0}")]
    PromptError(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, VerifyError>;

impl From<std::io::Error> for VerifyError {
    fn from(err: std::io::Error) -> Self {
        VerifyError::IoError(err.to_string())
    }
}

impl From<dialoguer::Error> for VerifyError {
    fn from(err: dialoguer::Error) -> Self {
        VerifyError::PromptError(err.to_string())
    }
}
