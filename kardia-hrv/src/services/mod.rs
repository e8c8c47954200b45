//! Pipeline services

pub mod comment_interpreter;
pub mod detector_reader;
pub mod file_scanner;
pub mod hrv_merger;
pub mod metadata_store;
pub mod pipeline_driver;
pub mod reconciler;
pub mod report_writer;

pub use comment_interpreter::{CommentInterpreter, SubjectIdPrecedence};
pub use detector_reader::{load_summary, DetectorParseError, DetectorSummary};
pub use file_scanner::{FileScanner, LocatedRecordings, ScanError};
pub use hrv_merger::{FeatureComputer, FeatureError, HrvMerger, PoincareComputer};
pub use metadata_store::{MetadataStore, StoreError};
pub use pipeline_driver::{DriverConfig, DriverReport, PipelineDriver, PipelineSteps, StepFailure};
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use report_writer::{ReportError, ReportWriter};
