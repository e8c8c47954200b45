//! Data models for the HRV reconciliation pipeline

pub mod comment;
pub mod hrv;
pub mod metadata;
pub mod record;
pub mod recording;

pub use comment::{InterpretedComment, Phase, Role};
pub use hrv::{AlgorithmMask, DetectorAlgorithm, HrvMetrics};
pub use metadata::MetadataRow;
pub use record::{ReconciledRecord, RecordCollector, RecordingFailure};
pub use recording::{RecordKey, RecordingIdentity};
