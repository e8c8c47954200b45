//! Record reconciler
//!
//! Composes the locator output, the metadata store, the comment interpreter, the
//! detector summaries and the feature merger into report rows: one row per recording
//! and configured detector whose summary file exists.
//!
//! **Per recording:**
//! 1. Resolve metadata (blank row when the store has none or is not configured)
//! 2. Interpret the comment when enabled
//! 3. For each selected detector: load the summary, merge computed features, emit
//!
//! Missing or malformed detector files skip only that detector's row. A store failure
//! that is not a per-recording miss stops the batch; rows collected so far are kept.

use crate::models::record::{FailureStage, RecordingFailure};
use crate::models::{
    AlgorithmMask, DetectorAlgorithm, InterpretedComment, MetadataRow, ReconciledRecord,
    RecordCollector, RecordingIdentity,
};
use crate::services::comment_interpreter::CommentInterpreter;
use crate::services::detector_reader::load_summary;
use crate::services::file_scanner::LocatedRecordings;
use crate::services::hrv_merger::HrvMerger;
use crate::services::metadata_store::{MetadataStore, StoreError};
use tokio_util::sync::CancellationToken;

/// Reconciler settings
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Name of the per-directory folder holding detector output
    pub work_dir: String,
    /// Detectors whose output is reconciled
    pub algorithms: AlgorithmMask,
    /// Calculator name written to every row
    pub calculator_name: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            work_dir: "work".to_string(),
            algorithms: AlgorithmMask::ALL,
            calculator_name: "physionet-get_hrv".to_string(),
        }
    }
}

/// Base fields shared by every row of one recording
struct RecordingBase<'a> {
    identity: &'a RecordingIdentity,
    metadata: MetadataRow,
    interpreted: InterpretedComment,
}

/// Record reconciler
pub struct Reconciler {
    config: ReconcilerConfig,
    store: Option<MetadataStore>,
    interpreter: Option<CommentInterpreter>,
    merger: HrvMerger,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            store: None,
            interpreter: None,
            merger: HrvMerger::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Resolve metadata from this store
    pub fn with_store(mut self, store: MetadataStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Enable comment interpretation
    pub fn with_interpreter(mut self, interpreter: CommentInterpreter) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    /// Stop before the next recording once this token is cancelled
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reconcile every located recording into `collector`
    ///
    /// On a non-recoverable store error the failure is recorded, the loop stops and the
    /// error is returned; rows already pushed stay in `collector`.
    pub async fn reconcile_all(
        &self,
        located: &LocatedRecordings,
        collector: &mut RecordCollector,
    ) -> Result<(), StoreError> {
        tracing::info!(
            "Reconciling {} recordings (detectors: {})",
            located.len(),
            self.config
                .algorithms
                .algorithms()
                .map(|a| a.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        for identity in located.iter() {
            if self.cancel.is_cancelled() {
                tracing::warn!("Reconciliation cancelled");
                break;
            }

            match self.reconcile_one(identity).await {
                Ok(rows) => {
                    if rows.is_empty() {
                        tracing::debug!(
                            recording = %identity.recording_id,
                            "No detector output, recording omitted from report"
                        );
                    }
                    for row in rows {
                        collector.push(row);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        recording = %identity.recording_id,
                        path = %identity.source_file_path.display(),
                        "Reconciliation aborted: {}",
                        e
                    );
                    collector.record_failure(RecordingFailure {
                        stage: FailureStage::Reconcile,
                        path: identity.source_file_path.clone(),
                        reason: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Rows for one recording, in detector order
    pub async fn reconcile_one(
        &self,
        identity: &RecordingIdentity,
    ) -> Result<Vec<ReconciledRecord>, StoreError> {
        let metadata = self.resolve_metadata(identity).await?;
        let interpreted = match &self.interpreter {
            Some(interpreter) => interpreter.interpret(metadata.comment.as_deref()),
            None => InterpretedComment::default(),
        };

        let base = RecordingBase {
            identity,
            metadata,
            interpreted,
        };

        Ok(self
            .config
            .algorithms
            .algorithms()
            .filter_map(|algorithm| self.reconcile_algorithm(&base, algorithm))
            .collect())
    }

    async fn resolve_metadata(&self, identity: &RecordingIdentity) -> Result<MetadataRow, StoreError> {
        let Some(store) = &self.store else {
            return Ok(MetadataRow::default());
        };

        match store.lookup(&identity.raw_filename).await {
            Ok(row) => Ok(row),
            Err(e) if e.is_recoverable() => {
                tracing::error!(
                    recording = %identity.recording_id,
                    path = %identity.source_file_path.display(),
                    "{}, continuing with blank metadata",
                    e
                );
                Ok(MetadataRow::default())
            }
            Err(e) => Err(e),
        }
    }

    fn reconcile_algorithm(
        &self,
        base: &RecordingBase<'_>,
        algorithm: DetectorAlgorithm,
    ) -> Option<ReconciledRecord> {
        let identity = base.identity;
        let summary_path = identity.work_file(&self.config.work_dir, &algorithm.summary_suffix());

        let summary = match load_summary(&summary_path) {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                tracing::error!(
                    recording = %identity.recording_id,
                    algorithm = algorithm.name(),
                    path = %summary_path.display(),
                    "Detector summary not found"
                );
                return None;
            }
            Err(e) => {
                tracing::error!(
                    recording = %identity.recording_id,
                    algorithm = algorithm.name(),
                    "{}",
                    e
                );
                return None;
            }
        };

        let rr_path = identity.work_file(&self.config.work_dir, &algorithm.rr_series_suffix());
        let hrv = self
            .merger
            .enrich(&identity.recording_id, summary.metrics, &rr_path);

        let source_filename = if base.metadata.matched_filename.is_empty() {
            identity.raw_filename.clone()
        } else {
            base.metadata.matched_filename.clone()
        };

        Some(ReconciledRecord {
            recording_id: identity.recording_id.clone(),
            patient_id: base.interpreted.subject_id.clone(),
            group: identity.group.clone(),
            pre_post: base.interpreted.phase.as_str().to_string(),
            dr_or_pt: base.interpreted.role.as_str().to_string(),
            duration_ms: base.metadata.duration_ms,
            timestamp: base.metadata.timestamp.clone(),
            heart_rate_bpm: base.metadata.heart_rate_bpm,
            comment: base.metadata.comment.clone().unwrap_or_default(),
            source_filename,
            qrs_algorithm: algorithm.name().to_string(),
            hrv_calculator: self.config.calculator_name.clone(),
            hrv,
        })
    }
}
