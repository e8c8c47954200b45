//! Recording and detector output fixtures

use kardia_hrv::models::DetectorAlgorithm;
use std::fs;
use std::path::{Path, PathBuf};

/// Well-formed get_hrv summary line
pub const SUMMARY_LINE: &str = "rec : 0.95 450.2 55.1 10 5 3 2 : 30.5 8.1 1100 900 700 1.3";

/// Alternating 800/1000 ms beat intervals
const RR_SERIES: &str = "0.8\t0.8\n1.8\t1.0\n2.6\t0.8\n3.6\t1.0\n4.4\t0.8\n";

/// Create an empty raw recording file
pub fn write_raw_recording(dir: &Path, file_name: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(file_name);
    fs::write(&path, b"ATC\0").unwrap();
    path
}

fn work_file(dir: &Path, record_id: &str, suffix: &str) -> PathBuf {
    let work = dir.join("work");
    fs::create_dir_all(&work).unwrap();
    work.join(format!("{}.{}", record_id, suffix))
}

/// Write a detector summary for one recording
pub fn write_detector_summary(dir: &Path, record_id: &str, algorithm: DetectorAlgorithm, line: &str) {
    fs::write(work_file(dir, record_id, &algorithm.summary_suffix()), format!("{}\n", line)).unwrap();
}

/// Write the lead I beat-interval export for one recording
pub fn write_rr_series(dir: &Path, record_id: &str, algorithm: DetectorAlgorithm) {
    fs::write(work_file(dir, record_id, &algorithm.rr_series_suffix()), RR_SERIES).unwrap();
}
