//! HRV feature merger
//!
//! Overlays the nonlinear features computed from the beat-interval series onto the
//! detector's own time/frequency-domain numbers. The detector stays authoritative for
//! every field it reports; only `mean_hr` and the Poincaré fields come from the
//! computation.

use crate::models::HrvMetrics;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Minimum number of intervals for a meaningful Poincaré estimate
pub const MIN_INTERVALS: usize = 3;

/// Feature computation errors (fatal to the merge only)
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Beat-interval export missing
    #[error("Beat-interval series not found: {0}")]
    SeriesMissing(PathBuf),

    #[error("Failed to read beat-interval series {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Row without a numeric interval column
    #[error("{path}:{line}: expected '<time>\\t<rr seconds>'")]
    MalformedRow { path: PathBuf, line: usize },

    #[error("Need at least {MIN_INTERVALS} beat intervals, got {0}")]
    TooFewIntervals(usize),

    /// Perfectly regular series: SD1 is zero and the ratio undefined
    #[error("Beat intervals have no successive variability (SD1 = 0)")]
    NoVariability,
}

/// Read a Kubios beat-interval export as integer milliseconds
///
/// Rows are `time_seconds <TAB> rr_seconds`; intervals are scaled to milliseconds by
/// truncation. Blank lines are ignored.
pub fn read_rr_series(path: &Path) -> Result<Vec<i64>, FeatureError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FeatureError::SeriesMissing(path.to_path_buf()))
        }
        Err(e) => {
            return Err(FeatureError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let mut intervals = Vec::new();
    for (index, row) in content.lines().enumerate() {
        if row.trim().is_empty() {
            continue;
        }

        let seconds: f64 = row
            .split('\t')
            .nth(1)
            .and_then(|field| field.trim().parse().ok())
            .ok_or_else(|| FeatureError::MalformedRow {
                path: path.to_path_buf(),
                line: index + 1,
            })?;

        intervals.push((seconds * 1000.0) as i64);
    }

    Ok(intervals)
}

/// Computation of the nonlinear HRV features from a beat-interval series
pub trait FeatureComputer: Send + Sync {
    /// Name for diagnostics
    fn name(&self) -> &str;

    /// Compute features from intervals in milliseconds
    ///
    /// Only `mean_hr`, `sd1`, `sd2` and `ratio_sd2_sd1` are read from the result.
    fn compute(&self, rr_ms: &[i64]) -> Result<HrvMetrics, FeatureError>;
}

/// Poincaré-plot geometry over the raw interval series
#[derive(Debug, Clone, Copy, Default)]
pub struct PoincareComputer;

fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
}

impl FeatureComputer for PoincareComputer {
    fn name(&self) -> &str {
        "poincare"
    }

    fn compute(&self, rr_ms: &[i64]) -> Result<HrvMetrics, FeatureError> {
        if rr_ms.len() < MIN_INTERVALS {
            return Err(FeatureError::TooFewIntervals(rr_ms.len()));
        }

        let rr: Vec<f64> = rr_ms.iter().map(|&v| v as f64).collect();
        let diffs: Vec<f64> = rr.windows(2).map(|w| w[1] - w[0]).collect();

        let mean_hr = rr.iter().map(|v| 60_000.0 / v).sum::<f64>() / rr.len() as f64;

        let diff_var = sample_variance(&diffs);
        let sd1 = (0.5 * diff_var).sqrt();
        let sd2 = (2.0 * sample_variance(&rr) - 0.5 * diff_var).max(0.0).sqrt();

        if sd1 == 0.0 || !sd1.is_finite() || !mean_hr.is_finite() {
            return Err(FeatureError::NoVariability);
        }

        Ok(HrvMetrics {
            mean_hr,
            sd1,
            sd2,
            ratio_sd2_sd1: sd2 / sd1,
            ..HrvMetrics::default()
        })
    }
}

/// Merges computed nonlinear features into detector metrics
pub struct HrvMerger {
    computer: Box<dyn FeatureComputer>,
}

impl Default for HrvMerger {
    fn default() -> Self {
        Self::new(Box::new(PoincareComputer))
    }
}

impl HrvMerger {
    pub fn new(computer: Box<dyn FeatureComputer>) -> Self {
        Self { computer }
    }

    /// Detector fields win; `mean_hr` and the Poincaré fields come from `computed`
    pub fn merge(detector: &HrvMetrics, computed: &HrvMetrics) -> HrvMetrics {
        HrvMetrics {
            mean_hr: computed.mean_hr,
            sd1: computed.sd1,
            sd2: computed.sd2,
            ratio_sd2_sd1: computed.ratio_sd2_sd1,
            ..*detector
        }
    }

    /// Compute features from the interval export and merge them in
    pub fn compute_and_merge(
        &self,
        detector: &HrvMetrics,
        rr_series_path: &Path,
    ) -> Result<HrvMetrics, FeatureError> {
        let rr_ms = read_rr_series(rr_series_path)?;
        let computed = self.computer.compute(&rr_ms)?;
        Ok(Self::merge(detector, &computed))
    }

    /// Like [`HrvMerger::compute_and_merge`], keeping the detector metrics on failure
    pub fn enrich(&self, recording_id: &str, detector: HrvMetrics, rr_series_path: &Path) -> HrvMetrics {
        match self.compute_and_merge(&detector, rr_series_path) {
            Ok(merged) => merged,
            Err(e) => {
                tracing::error!(
                    recording = recording_id,
                    computer = self.computer.name(),
                    path = %rr_series_path.display(),
                    "HRV feature merge skipped: {}",
                    e
                );
                detector
            }
        }
    }
}
