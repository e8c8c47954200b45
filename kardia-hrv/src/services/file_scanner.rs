//! Raw recording locator
//!
//! Recursive discovery of raw recording files by extension, and derivation of the
//! sanitized recording identifier used to name every downstream work file.
//!
//! Identifier rules:
//! - start from the file name without its extension
//! - longer than 40 characters: keep the trailing 39 and prefix with `_`
//! - `[A-Za-z0-9_]` only: used as-is
//! - otherwise strip hyphens and re-validate; still invalid rejects the file

use crate::models::record::{FailureStage, RecordingFailure};
use crate::models::{RecordKey, RecordingIdentity};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Maximum identifier length accepted by the downstream WFDB tools
pub const MAX_RECORD_ID_LEN: usize = 40;

/// Prefix marking an identifier shortened from a longer file name
pub const LONG_NAME_MARKER: char = '_';

/// Locator errors (fatal to the run)
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Identifier sanitization failure (fatal to one recording)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("empty recording name")]
    Empty,

    #[error("recording name '{0}' contains characters other than letters, digits, underscores and hyphens")]
    InvalidCharacters(String),
}

fn is_valid_record_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Derive the recording identifier from a file name without extension
pub fn sanitize_record_id(stem: &str) -> Result<String, SanitizeError> {
    if stem.is_empty() {
        return Err(SanitizeError::Empty);
    }

    let length = stem.chars().count();
    let candidate: String = if length > MAX_RECORD_ID_LEN {
        std::iter::once(LONG_NAME_MARKER)
            .chain(stem.chars().skip(length - (MAX_RECORD_ID_LEN - 1)))
            .collect()
    } else {
        stem.to_string()
    };

    if is_valid_record_id(&candidate) {
        return Ok(candidate);
    }

    let without_hyphens: String = candidate.chars().filter(|c| *c != '-').collect();
    if is_valid_record_id(&without_hyphens) {
        return Ok(without_hyphens);
    }

    Err(SanitizeError::InvalidCharacters(stem.to_string()))
}

/// Outcome of a locate pass
#[derive(Debug, Default)]
pub struct LocatedRecordings {
    /// Accepted recordings, ordered by directory then identifier
    pub recordings: BTreeMap<RecordKey, RecordingIdentity>,
    /// Files that could not be given a usable identifier
    pub rejected: Vec<RecordingFailure>,
}

impl LocatedRecordings {
    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordingIdentity> {
        self.recordings.values()
    }
}

/// Raw recording file scanner
pub struct FileScanner {
    extension: String,
    ignored_names: Vec<String>,
    max_depth: Option<usize>,
}

impl FileScanner {
    /// Scanner for files ending in `.<extension>` (case-insensitive)
    ///
    /// Ignores system entries like .DS_Store, .git, etc.
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_lowercase(),
            ignored_names: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
            ],
            max_depth: None,
        }
    }

    /// Limit recursion depth (1 = root directory only)
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Recursively list every file with the configured extension, sorted by path
    pub fn scan(&self, root_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }

        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut symlink_visited = HashSet::new();
        let mut files = Vec::new();

        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .max_depth(self.max_depth.unwrap_or(usize::MAX))
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &mut symlink_visited));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file()
                        && self.matches_extension(&entry.file_name().to_string_lossy())
                    {
                        files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        tracing::debug!(
            root = %root_path.display(),
            count = files.len(),
            "Scan found {} .{} files",
            files.len(),
            self.extension
        );

        Ok(files)
    }

    /// Scan and derive a directory-scoped identity for every file
    pub fn locate(&self, root_path: &Path) -> Result<LocatedRecordings, ScanError> {
        let files = self.scan(root_path)?;
        let mut located = LocatedRecordings::default();

        for path in files {
            let raw_filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let stem = self.strip_extension(&raw_filename);

            let recording_id = match sanitize_record_id(stem) {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!(
                        path = %path.display(),
                        "Rejecting recording {}: {}",
                        raw_filename,
                        e
                    );
                    located.rejected.push(RecordingFailure {
                        stage: FailureStage::Locate,
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let group = path
                .parent()
                .and_then(|dir| dir.strip_prefix(root_path).ok())
                .map(|rel| rel.to_string_lossy().to_string())
                .unwrap_or_default();

            let identity = RecordingIdentity {
                recording_id,
                source_file_path: path.clone(),
                raw_filename,
                group,
            };

            let key = identity.key();
            if let Some(existing) = located.recordings.get(&key) {
                let reason = format!(
                    "identifier '{}' already taken by {}",
                    key.recording_id, existing.raw_filename
                );
                tracing::error!(path = %path.display(), "Rejecting recording: {}", reason);
                located.rejected.push(RecordingFailure {
                    stage: FailureStage::Locate,
                    path,
                    reason,
                });
                continue;
            }

            located.recordings.insert(key, identity);
        }

        tracing::info!(
            "Located {} recordings ({} rejected) under {}",
            located.recordings.len(),
            located.rejected.len(),
            root_path.display()
        );

        Ok(located)
    }

    fn matches_extension(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        lower.len() > self.extension.len() + 1 && lower.ends_with(&format!(".{}", self.extension))
    }

    fn strip_extension<'a>(&self, file_name: &'a str) -> &'a str {
        let cut = file_name.len().saturating_sub(self.extension.len() + 1);
        file_name.get(..cut).unwrap_or(file_name)
    }

    /// Check if entry should be processed
    fn should_process_entry(
        &self,
        entry: &DirEntry,
        symlink_visited: &mut HashSet<PathBuf>,
    ) -> bool {
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();

        // The scan root is always walked, whatever its name
        if entry.depth() > 0 && self.ignored_names.iter().any(|name| file_name == name.as_str()) {
            return false;
        }

        // Detect symlink loops
        if entry.file_type().is_symlink() {
            if let Ok(canonical) = path.canonicalize() {
                if !symlink_visited.insert(canonical) {
                    tracing::warn!("Symlink loop detected: {}", path.display());
                    return false;
                }
            }
        }

        true
    }
}
