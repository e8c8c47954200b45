//! # Kardia Common Library
//!
//! Shared code for the Kardia HRV tools:
//! - Error and result types
//! - TOML bootstrap configuration and config-file resolution
//! - Logging initialisation
//! - Epoch conversion for metadata-store timestamps

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
