//! Reconciled report rows and the collector that owns them

use super::hrv::HrvMetrics;
use std::fmt;
use std::path::PathBuf;

/// One report row: a recording reconciled against one detector's output
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub recording_id: String,
    pub patient_id: String,
    pub group: String,
    pub pre_post: String,
    pub dr_or_pt: String,
    pub duration_ms: i64,
    pub timestamp: String,
    pub heart_rate_bpm: f64,
    pub comment: String,
    pub source_filename: String,
    pub qrs_algorithm: String,
    pub hrv_calculator: String,
    pub hrv: HrvMetrics,
}

impl ReconciledRecord {
    /// Leading report columns, followed by [`HrvMetrics::HEADERS`]
    pub const BASE_HEADERS: [&'static str; 12] = [
        "recordName",
        "patientId",
        "group",
        "prePost",
        "drOrPt",
        "durationMs",
        "date",
        "heartRate",
        "comment",
        "atcFilename",
        "hrvQrsAlgo",
        "hrvCalculator",
    ];

    /// Full header row
    pub fn headers() -> Vec<&'static str> {
        Self::BASE_HEADERS
            .iter()
            .chain(HrvMetrics::HEADERS.iter())
            .copied()
            .collect()
    }

    /// Row values as text, in [`ReconciledRecord::headers`] order
    pub fn fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.recording_id.clone(),
            self.patient_id.clone(),
            self.group.clone(),
            self.pre_post.clone(),
            self.dr_or_pt.clone(),
            self.duration_ms.to_string(),
            self.timestamp.clone(),
            self.heart_rate_bpm.to_string(),
            self.comment.clone(),
            self.source_filename.clone(),
            self.qrs_algorithm.clone(),
            self.hrv_calculator.clone(),
        ];
        fields.extend(self.hrv.values().iter().map(|v| v.to_string()));
        fields
    }
}

/// Stage at which a recording dropped out of the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Identifier could not be sanitized, or collided with another file
    Locate,
    /// External conversion/calculation pipeline failed
    Driver,
    /// Unexpected error while reconciling; later recordings were not processed
    Reconcile,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Locate => "locate",
            FailureStage::Driver => "driver",
            FailureStage::Reconcile => "reconcile",
        };
        f.write_str(s)
    }
}

/// A recording excluded from (or cut short in) the report
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingFailure {
    pub stage: FailureStage,
    pub path: PathBuf,
    pub reason: String,
}

/// Result collector owned by the caller, filled by the reconciler, drained by the writer
#[derive(Debug, Default)]
pub struct RecordCollector {
    records: Vec<ReconciledRecord>,
    failures: Vec<RecordingFailure>,
}

impl RecordCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ReconciledRecord) {
        self.records.push(record);
    }

    pub fn record_failure(&mut self, failure: RecordingFailure) {
        self.failures.push(failure);
    }

    pub fn records(&self) -> &[ReconciledRecord] {
        &self.records
    }

    pub fn failures(&self) -> &[RecordingFailure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand the rows over to the report writer
    pub fn into_records(self) -> Vec<ReconciledRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_and_fields_align() {
        let record = ReconciledRecord {
            recording_id: "r1".to_string(),
            patient_id: "1234".to_string(),
            group: String::new(),
            pre_post: "pre".to_string(),
            dr_or_pt: "pt".to_string(),
            duration_ms: 30_000,
            timestamp: "2019-06-01T12:00:00Z".to_string(),
            heart_rate_bpm: 72.5,
            comment: "pre pt 1234".to_string(),
            source_filename: "r1.atc".to_string(),
            qrs_algorithm: "GQRS".to_string(),
            hrv_calculator: "physionet-get_hrv".to_string(),
            hrv: HrvMetrics::default(),
        };

        let headers = ReconciledRecord::headers();
        let fields = record.fields();
        assert_eq!(headers.len(), 27);
        assert_eq!(headers.len(), fields.len());
        assert_eq!(fields[5], "30000");
        assert_eq!(fields[7], "72.5");
        assert_eq!(headers[12], "nn_rr");
    }
}
