//! Metadata store row

/// One recording's row from the metadata store
///
/// Fetched at most once per recording and never mutated. A recording without a
/// matching row is reconciled against [`MetadataRow::default`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRow {
    /// Recording duration in milliseconds
    pub duration_ms: i64,
    /// RFC 3339 timestamp derived from the stored epoch offset
    pub timestamp: String,
    /// Average heart rate reported by the device
    pub heart_rate_bpm: f64,
    /// Free-text comment entered by the operator
    pub comment: Option<String>,
    /// Filename column of the matching row
    pub matched_filename: String,
}
