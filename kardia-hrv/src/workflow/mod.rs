//! Batch workflow
//!
//! Locate → drive external pipeline → reconcile → write report.
//!
//! An interrupt before the report is written discards the run: no partial report is
//! produced. A reconciliation abort still writes the rows collected before it.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::{RecordCollector, RecordingFailure};
use crate::services::{
    CommentInterpreter, DriverReport, FileScanner, MetadataStore, PipelineDriver, Reconciler,
    ReportWriter,
};
use tokio_util::sync::CancellationToken;

pub const EXIT_SUCCESS: i32 = 0;
/// Report written, but some recordings failed or were skipped
pub const EXIT_PARTIAL: i32 = 1;
/// Fatal-to-run error, nothing written
pub const EXIT_FATAL: i32 = 2;
/// Interrupted, nothing written
pub const EXIT_INTERRUPTED: i32 = 130;

/// Outcome of one batch run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Recordings accepted by the locator
    pub located: usize,
    /// `None` when the driver was skipped or never started
    pub driver: Option<DriverReport>,
    /// Rows in the written report
    pub rows: usize,
    /// Every recording-level failure, in stage order
    pub failures: Vec<RecordingFailure>,
    /// Reconciliation stopped early on an unexpected store error
    pub aborted: bool,
    pub interrupted: bool,
    pub report_written: bool,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            EXIT_INTERRUPTED
        } else if self.aborted || !self.failures.is_empty() {
            EXIT_PARTIAL
        } else {
            EXIT_SUCCESS
        }
    }

    fn log(&self) {
        for failure in &self.failures {
            tracing::error!(
                stage = %failure.stage,
                path = %failure.path.display(),
                "Recording failed: {}",
                failure.reason
            );
        }

        tracing::info!(
            located = self.located,
            rows = self.rows,
            failures = self.failures.len(),
            aborted = self.aborted,
            interrupted = self.interrupted,
            "Batch finished (exit code {})",
            self.exit_code()
        );
    }
}

/// Run one batch end to end
pub async fn run_batch(
    config: &PipelineConfig,
    cancel: CancellationToken,
) -> Result<RunSummary, PipelineError> {
    let store = match &config.metadata_db {
        Some(path) => Some(MetadataStore::open(path, &config.enhanced_marker).await?),
        None => None,
    };

    let located = FileScanner::new(&config.extension).locate(&config.input_dir)?;
    let mut summary = RunSummary {
        located: located.len(),
        failures: located.rejected.clone(),
        ..RunSummary::default()
    };

    if let Some(driver_config) = &config.driver {
        let driver = PipelineDriver::new(driver_config.clone(), cancel.clone());
        let report = driver
            .run(&located)
            .await
            .map_err(|source| PipelineError::RunLog {
                path: driver_config.log_file.clone(),
                source,
            })?;

        if !report.all_succeeded() {
            tracing::warn!(
                "{} recordings failed in the external pipeline, reconciling what was produced",
                report.failures.len()
            );
        }
        summary.failures.extend(report.failures.iter().cloned());
        summary.driver = Some(report);
    } else {
        tracing::info!("External pipeline skipped");
    }

    if cancel.is_cancelled() {
        summary.interrupted = true;
        summary.log();
        return Ok(summary);
    }

    let mut reconciler = Reconciler::new(config.reconciler.clone()).with_cancellation(cancel.clone());
    if let Some(store) = store {
        reconciler = reconciler.with_store(store);
    }
    if let Some(precedence) = config.interpretation {
        reconciler = reconciler.with_interpreter(CommentInterpreter::new(precedence));
    }

    let mut collector = RecordCollector::new();
    if reconciler.reconcile_all(&located, &mut collector).await.is_err() {
        summary.aborted = true;
    }

    if cancel.is_cancelled() {
        summary.interrupted = true;
        summary.log();
        return Ok(summary);
    }

    summary.failures.extend(collector.failures().iter().cloned());
    let records = collector.into_records();

    ReportWriter::new(&config.output).write(&records)?;
    summary.rows = records.len();
    summary.report_written = true;

    summary.log();
    Ok(summary)
}
