//! End-to-end batch tests: locate → reconcile → report, with the external pipeline skipped

mod helpers;

use helpers::*;
use kardia_hrv::config::{HrvToml, PipelineConfig, RunOverrides};
use kardia_hrv::models::record::FailureStage;
use kardia_hrv::models::DetectorAlgorithm;
use kardia_hrv::workflow::{run_batch, EXIT_PARTIAL, EXIT_SUCCESS};
use serial_test::serial;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Report rows as field vectors, header excluded
fn read_report(path: &Path) -> Vec<Vec<String>> {
    std::fs::read_to_string(path)
        .unwrap()
        .split("\r\n")
        .skip(1)
        .filter(|line| !line.is_empty())
        .map(|line| line.split(';').map(str::to_string).collect())
        .collect()
}

fn column(name: &str) -> usize {
    kardia_hrv::models::ReconciledRecord::headers()
        .iter()
        .position(|h| *h == name)
        .unwrap()
}

#[tokio::test]
#[serial]
async fn test_three_recordings_yield_two_one_and_zero_rows() {
    let logs = init_test_logging();
    logs.clear();

    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("recordings");

    // A: both detectors and a metadata row
    write_raw_recording(&input, "recA.atc");
    write_detector_summary(&input, "recA", DetectorAlgorithm::Gqrs, SUMMARY_LINE);
    write_detector_summary(&input, "recA", DetectorAlgorithm::Ecgpu, SUMMARY_LINE);
    write_rr_series(&input, "recA", DetectorAlgorithm::Gqrs);

    // B: one detector, no metadata row
    write_raw_recording(&input, "recB.atc");
    write_detector_summary(&input, "recB", DetectorAlgorithm::Ecgpu, SUMMARY_LINE);

    // C: unusable identifier
    write_raw_recording(&input, "bad name!.atc");

    let store = create_metadata_store(
        temp_dir.path(),
        "alive.sqlite",
        &[EcgRowFixture::new("recA.atc").comment("PRE pt 1234")],
    )
    .await
    .unwrap();

    let output = temp_dir.path().join("report.csv");
    let config = PipelineConfig::resolve(
        RunOverrides {
            input_dir: input.clone(),
            output: Some(output.clone()),
            metadata_db: Some(store),
            interpret_comments: true,
            skip_driver: true,
            ..RunOverrides::default()
        },
        HrvToml::default(),
    )
    .unwrap();

    let summary = run_batch(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.located, 2);
    assert_eq!(summary.rows, 3);
    assert!(summary.report_written);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].stage, FailureStage::Locate);
    assert!(summary.failures[0].path.ends_with("bad name!.atc"));
    assert_eq!(summary.exit_code(), EXIT_PARTIAL);

    let rows = read_report(&output);
    assert_eq!(rows.len(), 3);

    let rows_for = |id: &str| rows.iter().filter(|r| r[0] == id).count();
    assert_eq!(rows_for("recA"), 2);
    assert_eq!(rows_for("recB"), 1);

    let a_gqrs = &rows[0];
    assert_eq!(a_gqrs[column("patientId")], "1234");
    assert_eq!(a_gqrs[column("prePost")], "pre");
    assert_eq!(a_gqrs[column("drOrPt")], "pt");
    assert_eq!(a_gqrs[column("durationMs")], "30000");
    assert_eq!(a_gqrs[column("date")], "2019-06-01T12:00:00Z");
    assert_eq!(a_gqrs[column("hrvQrsAlgo")], "GQRS");
    assert_eq!(a_gqrs[column("avnn")], "450.2");
    assert_ne!(a_gqrs[column("sd1")], "0");

    // ECGPU has no beat-interval export for A: detector metrics only
    let a_ecgpu = &rows[1];
    assert_eq!(a_ecgpu[column("hrvQrsAlgo")], "ECGPU");
    assert_eq!(a_ecgpu[column("sd1")], "0");

    let b = &rows[2];
    assert_eq!(b[column("atcFilename")], "recB.atc");
    assert_eq!(b[column("patientId")], "");
    assert_eq!(b[column("durationMs")], "0");

    logs.assert_contains_at(Level::ERROR, "No metadata row for 'recB.atc'");
    logs.assert_contains_at(Level::ERROR, "Detector summary not found");
}

#[tokio::test]
#[serial]
async fn test_full_success_exit_code_and_report_replacement() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("in");
    write_raw_recording(&input, "r1.atc");
    write_detector_summary(&input, "r1", DetectorAlgorithm::Gqrs, SUMMARY_LINE);

    let output = temp_dir.path().join("report.csv");
    std::fs::write(&output, "old;report\r\nwith;rows\r\n").unwrap();

    let config = PipelineConfig::resolve(
        RunOverrides {
            input_dir: input,
            output: Some(output.clone()),
            algorithms: Some(1),
            skip_driver: true,
            ..RunOverrides::default()
        },
        HrvToml::default(),
    )
    .unwrap();

    let summary = run_batch(&config, CancellationToken::new()).await.unwrap();
    assert_eq!(summary.exit_code(), EXIT_SUCCESS);

    let content = std::fs::read_to_string(&output).unwrap();
    assert!(content.starts_with("recordName;"));
    assert!(!content.contains("old;report"));
    assert_eq!(read_report(&output).len(), 1);
}

#[tokio::test]
#[serial]
async fn test_interrupt_writes_no_report() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("in");
    write_raw_recording(&input, "r1.atc");
    write_detector_summary(&input, "r1", DetectorAlgorithm::Gqrs, SUMMARY_LINE);

    let output = temp_dir.path().join("report.csv");
    let config = PipelineConfig::resolve(
        RunOverrides {
            input_dir: input,
            output: Some(output.clone()),
            skip_driver: true,
            ..RunOverrides::default()
        },
        HrvToml::default(),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = run_batch(&config, cancel).await.unwrap();

    assert!(summary.interrupted);
    assert!(!summary.report_written);
    assert_eq!(summary.exit_code(), 130);
    assert!(!output.exists());
}

#[tokio::test]
#[serial]
async fn test_store_failure_aborts_but_still_writes_report() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("in");
    write_raw_recording(&input, "r1.atc");
    write_detector_summary(&input, "r1", DetectorAlgorithm::Gqrs, SUMMARY_LINE);

    // A store file without the ZECG table fails every query
    let store = temp_dir.path().join("empty.sqlite");
    let pool = sqlx::SqlitePool::connect_with(
        sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&store)
            .create_if_missing(true),
    )
    .await
    .unwrap();
    sqlx::query("CREATE TABLE OTHER (id INTEGER)").execute(&pool).await.unwrap();
    pool.close().await;

    let output = temp_dir.path().join("report.csv");
    let config = PipelineConfig::resolve(
        RunOverrides {
            input_dir: input,
            output: Some(output.clone()),
            metadata_db: Some(store),
            skip_driver: true,
            ..RunOverrides::default()
        },
        HrvToml::default(),
    )
    .unwrap();

    let summary = run_batch(&config, CancellationToken::new()).await.unwrap();
    assert!(summary.aborted);
    assert!(summary.report_written);
    assert_eq!(summary.exit_code(), EXIT_PARTIAL);
    assert_eq!(summary.failures[0].stage, FailureStage::Reconcile);
    assert!(output.exists());
}
