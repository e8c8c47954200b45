//! Test Helper Utilities
//!
//! Shared utilities for testing kardia-hrv

#![allow(dead_code)]

pub mod db_utils;
pub mod fixtures;
pub mod log_capture;

pub use db_utils::{create_metadata_store, EcgRowFixture};
pub use fixtures::{write_detector_summary, write_raw_recording, write_rr_series, SUMMARY_LINE};
pub use log_capture::{init_test_logging, LogCapture};
