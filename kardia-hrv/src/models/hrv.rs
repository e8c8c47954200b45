//! HRV metrics and beat-detection algorithm selection

use serde::{Deserialize, Serialize};
use std::fmt;

/// Flat set of HRV features for one recording and one detector
///
/// Time/frequency-domain fields come from the detector summary file; `mean_hr` and the
/// Poincaré fields come from the feature computation over the beat-interval series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HrvMetrics {
    pub nn_rr: f64,
    pub avnn: f64,
    pub sdnn: f64,
    pub rmssd: f64,
    pub pnn50: f64,
    pub tot_pwr: f64,
    pub ulf_pwr: f64,
    pub vlf_pwr: f64,
    pub lf_pwr: f64,
    pub hf_pwr: f64,
    pub lfhf_ratio: f64,
    pub mean_hr: f64,
    pub sd1: f64,
    pub sd2: f64,
    pub ratio_sd2_sd1: f64,
}

impl HrvMetrics {
    /// Report column names, in [`HrvMetrics::values`] order
    pub const HEADERS: [&'static str; 15] = [
        "nn_rr",
        "avnn",
        "sdnn",
        "rmssd",
        "pnn50",
        "tot_pwr",
        "ulf_pwr",
        "vlf_pwr",
        "lf_pwr",
        "hf_pwr",
        "lfhf_ratio",
        "mean_hr",
        "sd1",
        "sd2",
        "ratio_sd2_sd1",
    ];

    /// Field values in report order
    pub fn values(&self) -> [f64; 15] {
        [
            self.nn_rr,
            self.avnn,
            self.sdnn,
            self.rmssd,
            self.pnn50,
            self.tot_pwr,
            self.ulf_pwr,
            self.vlf_pwr,
            self.lf_pwr,
            self.hf_pwr,
            self.lfhf_ratio,
            self.mean_hr,
            self.sd1,
            self.sd2,
            self.ratio_sd2_sd1,
        ]
    }
}

/// External QRS detector whose output is reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorAlgorithm {
    Gqrs,
    Ecgpu,
}

impl DetectorAlgorithm {
    /// Every known algorithm, in report order
    pub const ALL: [DetectorAlgorithm; 2] = [DetectorAlgorithm::Gqrs, DetectorAlgorithm::Ecgpu];

    /// Bit in the `--algorithms` mask
    pub fn flag(&self) -> u8 {
        match self {
            DetectorAlgorithm::Gqrs => 0b01,
            DetectorAlgorithm::Ecgpu => 0b10,
        }
    }

    /// Name written to the report
    pub fn name(&self) -> &'static str {
        match self {
            DetectorAlgorithm::Gqrs => "GQRS",
            DetectorAlgorithm::Ecgpu => "ECGPU",
        }
    }

    /// Tag used in work-file names
    pub fn file_tag(&self) -> &'static str {
        match self {
            DetectorAlgorithm::Gqrs => "gqrs",
            DetectorAlgorithm::Ecgpu => "ecgpu",
        }
    }

    /// Work-file suffix of the one-line HRV summary
    pub fn summary_suffix(&self) -> String {
        format!("{}.gethrv.txt", self.file_tag())
    }

    /// Work-file suffix of the lead I beat-interval export
    pub fn rr_series_suffix(&self) -> String {
        format!("{}-lead1.rr.kubios.txt", self.file_tag())
    }
}

impl fmt::Display for DetectorAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Non-empty set of configured detection algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AlgorithmMask(u8);

impl AlgorithmMask {
    /// Every known algorithm
    pub const ALL: AlgorithmMask = AlgorithmMask(0b11);

    /// Validate a raw bitmask: non-zero, known bits only
    pub fn from_bits(bits: u8) -> Result<Self, String> {
        let known = DetectorAlgorithm::ALL
            .iter()
            .fold(0u8, |acc, algo| acc | algo.flag());

        if bits == 0 {
            return Err("algorithm mask selects no detector".to_string());
        }
        if bits & !known != 0 {
            return Err(format!(
                "algorithm mask {:#04b} has unknown bits (known: {:#04b})",
                bits, known
            ));
        }
        Ok(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, algorithm: DetectorAlgorithm) -> bool {
        self.0 & algorithm.flag() != 0
    }

    /// Selected algorithms in report order
    pub fn algorithms(&self) -> impl Iterator<Item = DetectorAlgorithm> + '_ {
        DetectorAlgorithm::ALL
            .into_iter()
            .filter(move |algo| self.contains(*algo))
    }
}

impl Default for AlgorithmMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl TryFrom<u8> for AlgorithmMask {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::from_bits(bits)
    }
}

impl From<AlgorithmMask> for u8 {
    fn from(mask: AlgorithmMask) -> u8 {
        mask.0
    }
}
