//! Common error types for the Kardia tools

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for Kardia operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by the Kardia crates
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite access failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configured log file could not be opened for appending
    #[error("Cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A file that must already exist is absent
    #[error("File not found: {}", .0.display())]
    MissingFile(PathBuf),
}
