//! Located recording identity

use std::fmt;
use std::path::{Path, PathBuf};

/// Directory-scoped key of a located recording
///
/// Two files with the same sanitized id in different directories never collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    /// Directory containing the raw file
    pub directory: PathBuf,
    /// Sanitized recording identifier
    pub recording_id: String,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.directory.join(&self.recording_id).display())
    }
}

/// One physical raw recording file, as found by the locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingIdentity {
    /// Sanitized identifier: at most 40 characters, `[A-Za-z0-9_]` only
    pub recording_id: String,
    /// Full path of the raw file
    pub source_file_path: PathBuf,
    /// File name including extension, as stored in the metadata store
    pub raw_filename: String,
    /// Containing directory relative to the scan root (`""` at the root)
    pub group: String,
}

impl RecordingIdentity {
    /// Directory holding the raw file
    pub fn directory(&self) -> &Path {
        self.source_file_path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Directory-scoped key
    pub fn key(&self) -> RecordKey {
        RecordKey {
            directory: self.directory().to_path_buf(),
            recording_id: self.recording_id.clone(),
        }
    }

    /// Per-recording working directory where converters and detectors write their output
    pub fn work_dir(&self, work_dir_name: &str) -> PathBuf {
        self.directory().join(work_dir_name)
    }

    /// Path of a work artifact: `<dir>/<work>/<recording_id>.<suffix>`
    pub fn work_file(&self, work_dir_name: &str, suffix: &str) -> PathBuf {
        self.work_dir(work_dir_name)
            .join(format!("{}.{}", self.recording_id, suffix))
    }
}
