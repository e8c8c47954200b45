//! Beat-detector result reader
//!
//! Parses the one-line summary written by PhysioNet `get_hrv` for one detector:
//!
//! ```text
//! <record> : NN/RR AVNN SDNN SDANN SDNNIDX rMSSD pNN50 : TOTPWR ULF VLF LF HF LF/HF
//! ```
//!
//! SDANN and SDNNIDX are not reported and are skipped. Everything else maps onto the
//! time/frequency-domain fields of [`HrvMetrics`]; the Poincaré fields stay zero.

use crate::models::HrvMetrics;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

const NUMBER: &str = r"([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)";

static SUMMARY_LINE: Lazy<Regex> = Lazy::new(|| {
    let seven = vec![NUMBER; 7].join(r"\s+");
    let six = vec![NUMBER; 6].join(r"\s+");
    // Tokens after the 14th value are ignored
    let pattern = format!(r"^\s*([\w/.\-]+)\s*:\s*{}\s*:\s*{}(?:\s|$)", seven, six);
    Regex::new(&pattern).expect("valid regex")
});

/// Detector summary errors (fatal to one recording × algorithm)
#[derive(Debug, Error)]
pub enum DetectorParseError {
    /// Summary file exists but could not be read
    #[error("Failed to read detector summary {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// First line does not follow the fixed 14-field layout
    #[error("Detector summary {path} does not match the get_hrv layout: '{line}'")]
    Format { path: PathBuf, line: String },
}

/// Parsed detector summary
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSummary {
    /// Record name echoed by the detector
    pub record_name: String,
    pub metrics: HrvMetrics,
}

/// Parse one summary line; `None` when the line does not match the layout
pub fn parse_summary_line(line: &str) -> Option<DetectorSummary> {
    let caps = SUMMARY_LINE.captures(line)?;

    let mut values = [0.0f64; 13];
    for (i, value) in values.iter_mut().enumerate() {
        *value = caps.get(i + 2)?.as_str().parse().ok()?;
    }

    let [nn_rr, avnn, sdnn, _sdann, _sdnnidx, rmssd, pnn50, tot_pwr, ulf_pwr, vlf_pwr, lf_pwr, hf_pwr, lfhf_ratio] =
        values;

    Some(DetectorSummary {
        record_name: caps.get(1)?.as_str().to_string(),
        metrics: HrvMetrics {
            nn_rr,
            avnn,
            sdnn,
            rmssd,
            pnn50,
            tot_pwr,
            ulf_pwr,
            vlf_pwr,
            lf_pwr,
            hf_pwr,
            lfhf_ratio,
            ..HrvMetrics::default()
        },
    })
}

/// Load a summary file
///
/// Returns `Ok(None)` when the file does not exist: a detector need not have run for
/// every recording.
pub fn load_summary(path: &Path) -> Result<Option<DetectorSummary>, DetectorParseError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(DetectorParseError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let line = content.lines().next().unwrap_or_default();
    parse_summary_line(line)
        .map(Some)
        .ok_or_else(|| DetectorParseError::Format {
            path: path.to_path_buf(),
            line: line.to_string(),
        })
}
