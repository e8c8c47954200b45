//! Metadata store adapter
//!
//! Looks up one `ZECG` row per raw recording file in the device app's SQLite export.
//!
//! **Lookup strategy:**
//! - file name contains the enhanced marker: query `ZENHANCEDFILENAME` first, then fall
//!   back to `ZFILENAME` with a warning
//! - otherwise query `ZFILENAME` directly
//!
//! Columns are decoded into a typed row at the query boundary; a row whose columns do
//! not decode is reported as [`StoreError::Malformed`] instead of being misread.

use crate::models::MetadataRow;
use kardia_common::time::format_core_data_offset;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Metadata store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store file given on the command line does not exist (fatal to the run)
    #[error("Metadata store not found: {0}")]
    StoreMissing(PathBuf),

    /// No row for this recording (recoverable, blank metadata is used)
    #[error("No metadata row for '{0}'")]
    NotFound(String),

    /// Row exists but its columns do not decode (recoverable, blank metadata is used)
    #[error("Malformed metadata row for '{filename}': {source}")]
    Malformed {
        filename: String,
        #[source]
        source: sqlx::Error,
    },

    /// Query or connection failure
    #[error("Metadata store query failed: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Per-recording condition the reconciler substitutes blank metadata for
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::Malformed { .. })
    }
}

/// Column a lookup is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupColumn {
    Filename,
    EnhancedFilename,
}

impl LookupColumn {
    fn column(&self) -> &'static str {
        match self {
            LookupColumn::Filename => "ZFILENAME",
            LookupColumn::EnhancedFilename => "ZENHANCEDFILENAME",
        }
    }
}

/// Typed `ZECG` row
#[derive(Debug, sqlx::FromRow)]
struct EcgRow {
    duration_ms: Option<i64>,
    date_recorded: Option<i64>,
    heart_rate: Option<f64>,
    comment: Option<String>,
    filename: Option<String>,
}

impl EcgRow {
    fn into_metadata(self, requested: &str) -> MetadataRow {
        MetadataRow {
            duration_ms: self.duration_ms.unwrap_or(0),
            timestamp: self
                .date_recorded
                .map(format_core_data_offset)
                .unwrap_or_default(),
            heart_rate_bpm: self.heart_rate.unwrap_or(0.0),
            comment: self.comment,
            matched_filename: self.filename.unwrap_or_else(|| requested.to_string()),
        }
    }
}

/// Read-only adapter over the metadata store
pub struct MetadataStore {
    db: SqlitePool,
    enhanced_marker: String,
}

impl MetadataStore {
    /// Open the store file read-only
    pub async fn open(path: &Path, enhanced_marker: &str) -> Result<Self, StoreError> {
        let db = crate::db::connect_readonly(path).await.map_err(|e| match e {
            kardia_common::Error::Database(db_err) => StoreError::Database(db_err),
            _ => StoreError::StoreMissing(path.to_path_buf()),
        })?;
        Ok(Self::from_pool(db, enhanced_marker))
    }

    /// Wrap an existing pool
    pub fn from_pool(db: SqlitePool, enhanced_marker: &str) -> Self {
        Self {
            db,
            enhanced_marker: enhanced_marker.to_lowercase(),
        }
    }

    /// Whether a file name carries the enhanced marker
    pub fn is_enhanced(&self, filename: &str) -> bool {
        !self.enhanced_marker.is_empty() && filename.to_lowercase().contains(&self.enhanced_marker)
    }

    /// Look up the row for one raw recording file name
    pub async fn lookup(&self, filename: &str) -> Result<MetadataRow, StoreError> {
        if self.is_enhanced(filename) {
            if let Some(row) = self.query_by(LookupColumn::EnhancedFilename, filename).await? {
                return Ok(row);
            }

            let row = self.query_by(LookupColumn::Filename, filename).await?;
            if row.is_some() {
                tracing::warn!(
                    filename,
                    "Enhanced recording '{}' matched only by plain filename",
                    filename
                );
            }
            return row.ok_or_else(|| StoreError::NotFound(filename.to_string()));
        }

        self.query_by(LookupColumn::Filename, filename)
            .await?
            .ok_or_else(|| StoreError::NotFound(filename.to_string()))
    }

    async fn query_by(
        &self,
        column: LookupColumn,
        filename: &str,
    ) -> Result<Option<MetadataRow>, StoreError> {
        let sql = format!(
            "SELECT CAST(ZDURATION_MS AS INTEGER) AS duration_ms, \
                    CAST(ZDATERECORDED AS INTEGER) AS date_recorded, \
                    CAST(ZHEARTRATE AS REAL) AS heart_rate, \
                    ZCOMMENT AS comment, \
                    ZFILENAME AS filename \
             FROM ZECG WHERE {} = ?",
            column.column()
        );

        let rows: Vec<EcgRow> = sqlx::query_as(&sql)
            .bind(filename)
            .fetch_all(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::ColumnDecode { .. }
                | sqlx::Error::ColumnNotFound(_)
                | sqlx::Error::ColumnIndexOutOfBounds { .. }
                | sqlx::Error::Decode(_) => StoreError::Malformed {
                    filename: filename.to_string(),
                    source: e,
                },
                other => StoreError::Database(other),
            })?;

        if rows.len() > 1 {
            tracing::warn!(
                filename,
                column = column.column(),
                "{} rows match '{}', using the first",
                rows.len(),
                filename
            );
        }

        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.into_metadata(filename)))
    }
}
