//! Configuration for kardia-hrv
//!
//! **Priority:** command line → `KARDIA_*` environment (both via clap) → TOML file →
//! built-in defaults.
//!
//! The TOML file is optional; every section and key has a default. The resolved
//! [`PipelineConfig`] is validated once at startup and any problem is fatal to the run.

use crate::error::PipelineError;
use crate::models::AlgorithmMask;
use crate::services::pipeline_driver::{default_worker_count, DriverConfig, PipelineSteps};
use crate::services::{ReconcilerConfig, StoreError, SubjectIdPrecedence};
use kardia_common::config::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Config file name looked up in the user and system config directories
pub const CONFIG_FILE_NAME: &str = "kardia-hrv.toml";

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "KARDIA_CONFIG";

/// Report file name used when `--output` is not given
pub const DEFAULT_REPORT_NAME: &str = "output.process-kardia.csv";

/// Run log file name used when `[driver] log_file` is not set
pub const DEFAULT_RUN_LOG_NAME: &str = "kardia-hrv.run.log";

/// `[locator]`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LocatorSection {
    /// Raw recording extension, matched case-insensitively
    pub extension: String,
    /// Work folder created next to each raw file
    pub work_dir: String,
}

impl Default for LocatorSection {
    fn default() -> Self {
        Self {
            extension: "atc".to_string(),
            work_dir: "work".to_string(),
        }
    }
}

/// `[metadata]`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetadataSection {
    /// Substring identifying enhanced recordings
    pub enhanced_marker: String,
    pub subject_id_precedence: SubjectIdPrecedence,
    /// Interpret comments even without `--interpret-comments`
    pub interpret_comments: bool,
}

impl Default for MetadataSection {
    fn default() -> Self {
        Self {
            enhanced_marker: "enhanced".to_string(),
            subject_id_precedence: SubjectIdPrecedence::default(),
            interpret_comments: false,
        }
    }
}

/// `[detectors]`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DetectorSection {
    /// Bitmask: 1 = GQRS, 2 = ECGPU
    pub algorithms: AlgorithmMask,
    pub calculator_name: String,
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            algorithms: AlgorithmMask::ALL,
            calculator_name: "physionet-get_hrv".to_string(),
        }
    }
}

/// `[driver]`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DriverSection {
    pub convert: Vec<String>,
    pub calculate: Vec<String>,
    pub render: Vec<String>,
    pub max_workers: Option<usize>,
    pub step_timeout_secs: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            convert: [
                "kardia-atc2edf",
                "--input",
                "{input}",
                "--output",
                "{work_dir}/{record}.edf",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            calculate: Vec::new(),
            render: Vec::new(),
            max_workers: None,
            step_timeout_secs: None,
            log_file: None,
        }
    }
}

/// Contents of `kardia-hrv.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HrvToml {
    pub logging: LoggingConfig,
    pub locator: LocatorSection,
    pub metadata: MetadataSection,
    pub detectors: DetectorSection,
    pub driver: DriverSection,
}

/// Values taken from the command line (or their `KARDIA_*` environment variables)
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub input_dir: PathBuf,
    pub output: Option<PathBuf>,
    pub metadata_db: Option<PathBuf>,
    pub interpret_comments: bool,
    pub algorithms: Option<u8>,
    pub skip_driver: bool,
    pub jobs: Option<usize>,
    pub step_timeout_secs: Option<u64>,
}

/// Fully resolved and validated run configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output: PathBuf,
    pub extension: String,
    pub metadata_db: Option<PathBuf>,
    pub enhanced_marker: String,
    /// `Some` when comments are interpreted
    pub interpretation: Option<SubjectIdPrecedence>,
    pub reconciler: ReconcilerConfig,
    /// `None` with `--skip-driver`
    pub driver: Option<DriverConfig>,
}

impl PipelineConfig {
    /// Merge overrides over the TOML settings and validate the result
    pub fn resolve(overrides: RunOverrides, toml: HrvToml) -> Result<Self, PipelineError> {
        let input_dir = overrides.input_dir;
        if !input_dir.is_dir() {
            return Err(PipelineError::Config(format!(
                "input directory {} does not exist or is not a directory",
                input_dir.display()
            )));
        }

        if let Some(db) = &overrides.metadata_db {
            if !db.is_file() {
                return Err(StoreError::StoreMissing(db.clone()).into());
            }
        }

        let algorithms = match overrides.algorithms {
            Some(bits) => AlgorithmMask::from_bits(bits)
                .map_err(|e| PipelineError::Config(format!("--algorithms: {}", e)))?,
            None => toml.detectors.algorithms,
        };

        let extension = toml.locator.extension.trim().trim_start_matches('.').to_string();
        if extension.is_empty() {
            return Err(PipelineError::Config(
                "[locator] extension must not be empty".to_string(),
            ));
        }

        let work_dir = toml.locator.work_dir.trim().to_string();
        if work_dir.is_empty() || work_dir.contains(std::path::MAIN_SEPARATOR) {
            return Err(PipelineError::Config(format!(
                "[locator] work_dir '{}' must be a single folder name",
                toml.locator.work_dir
            )));
        }

        let driver = if overrides.skip_driver {
            None
        } else {
            let max_workers = overrides
                .jobs
                .or(toml.driver.max_workers)
                .unwrap_or_else(default_worker_count);
            if max_workers == 0 {
                return Err(PipelineError::Config(
                    "worker count must be at least 1".to_string(),
                ));
            }

            let step_timeout = overrides
                .step_timeout_secs
                .or(toml.driver.step_timeout_secs)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs);

            Some(DriverConfig {
                steps: PipelineSteps {
                    convert: toml.driver.convert,
                    calculate: toml.driver.calculate,
                    render: toml.driver.render,
                },
                work_dir: work_dir.clone(),
                max_workers,
                step_timeout,
                log_file: toml
                    .driver
                    .log_file
                    .unwrap_or_else(|| input_dir.join(DEFAULT_RUN_LOG_NAME)),
            })
        };

        let interpretation = (overrides.interpret_comments || toml.metadata.interpret_comments)
            .then_some(toml.metadata.subject_id_precedence);

        Ok(Self {
            output: overrides
                .output
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_NAME)),
            extension,
            metadata_db: overrides.metadata_db,
            enhanced_marker: toml.metadata.enhanced_marker,
            interpretation,
            reconciler: ReconcilerConfig {
                work_dir,
                algorithms,
                calculator_name: toml.detectors.calculator_name,
            },
            driver,
            input_dir,
        })
    }
}
