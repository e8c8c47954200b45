//! kardia-hrv library interface
//!
//! Batch HRV processing of Kardia ECG recordings: locate raw recordings, drive the
//! external conversion/calculation tools, reconcile their output with the metadata
//! store and write a `;`-delimited report.

pub mod config;
pub mod convert;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::PipelineError;

/// Build identification captured by build.rs
pub mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const GIT_HASH: &str = env!("GIT_HASH");
    pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");
    pub const BUILD_PROFILE: &str = env!("BUILD_PROFILE");

    /// Log the build identification line
    pub fn log(binary: &str) {
        tracing::info!(
            "{} {} [{}] built {} ({})",
            binary,
            VERSION,
            GIT_HASH,
            BUILD_TIMESTAMP,
            BUILD_PROFILE
        );
    }
}
