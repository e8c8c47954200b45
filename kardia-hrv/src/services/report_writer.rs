//! Tabular report writer
//!
//! `;`-delimited text: one header row, one row per reconciled record. Fields are quoted
//! only when they contain the delimiter, a quote or a line break. The report is written
//! to a sibling temporary file and renamed over the target, so an existing report is
//! replaced whole or left untouched.

use crate::models::ReconciledRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DELIMITER: char = ';';
const QUOTE: char = '"';

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Quote a field if it would otherwise break the row
fn escape_field(field: &str) -> String {
    let needs_quoting = field
        .chars()
        .any(|c| c == DELIMITER || c == QUOTE || c == '\n' || c == '\r');

    if needs_quoting {
        format!("{q}{}{q}", field.replace(QUOTE, "\"\""), q = QUOTE)
    } else {
        field.to_string()
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ReportError {
    let path = path.to_path_buf();
    move |source| ReportError::Io { path, source }
}

fn format_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string());
    line.push_str("\r\n");
    line
}

/// Report writer bound to one output path
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write the header and every record, replacing any existing report
    pub fn write(&self, records: &[ReconciledRecord]) -> Result<(), ReportError> {
        let temp_path = self.temp_path();

        let file = File::create(&temp_path).map_err(io_err(&temp_path))?;
        let mut out = BufWriter::new(file);

        out.write_all(format_row(&ReconciledRecord::headers()).as_bytes())
            .map_err(io_err(&temp_path))?;
        for record in records {
            out.write_all(format_row(&record.fields()).as_bytes())
                .map_err(io_err(&temp_path))?;
        }

        out.into_inner()
            .map_err(|e| e.into_error())
            .and_then(|file| file.sync_all())
            .map_err(io_err(&temp_path))?;

        std::fs::rename(&temp_path, &self.path).map_err(io_err(&self.path))?;

        tracing::info!(
            "Wrote {} rows to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}
