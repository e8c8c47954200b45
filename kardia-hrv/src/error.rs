//! Error types for kardia-hrv
//!
//! Component errors live beside their components. [`PipelineError`] is the run-level
//! class: a run that hits one of these writes no report (except where noted) and exits
//! non-zero.

use crate::services::{ReportError, ScanError, StoreError};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal-to-run errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid command-line or file configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input directory missing or not a directory
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Metadata store file given but absent, or unusable
    #[error("Metadata store unavailable: {0}")]
    Store(#[from] StoreError),

    /// Driver run log could not be opened
    #[error("Cannot open run log {path}: {source}")]
    RunLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Report could not be written
    #[error(transparent)]
    Report(#[from] ReportError),
}
