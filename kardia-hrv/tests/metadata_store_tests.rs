//! Metadata store adapter against file-backed stores

mod helpers;

use helpers::*;
use kardia_hrv::services::{MetadataStore, StoreError};
use serial_test::serial;
use tracing::Level;

#[tokio::test]
#[serial]
async fn test_enhanced_fallback_logs_warning() {
    let logs = init_test_logging();
    logs.clear();

    let temp_dir = tempfile::tempdir().unwrap();
    let db = create_metadata_store(
        temp_dir.path(),
        "alive.sqlite",
        &[EcgRowFixture::new("rec_enhanced.atc").comment("post dr")],
    )
    .await
    .unwrap();

    let store = MetadataStore::open(&db, "enhanced").await.unwrap();
    let row = store.lookup("rec_enhanced.atc").await.unwrap();

    assert_eq!(row.matched_filename, "rec_enhanced.atc");
    assert_eq!(row.comment.as_deref(), Some("post dr"));
    logs.assert_contains_at(Level::WARN, "matched only by plain filename");
}

#[tokio::test]
#[serial]
async fn test_enhanced_column_match_does_not_warn() {
    let logs = init_test_logging();
    logs.clear();

    let temp_dir = tempfile::tempdir().unwrap();
    let db = create_metadata_store(
        temp_dir.path(),
        "alive.sqlite",
        &[EcgRowFixture::new("rec.atc").enhanced("rec_enhanced.atc")],
    )
    .await
    .unwrap();

    let store = MetadataStore::open(&db, "enhanced").await.unwrap();
    let row = store.lookup("rec_enhanced.atc").await.unwrap();

    assert_eq!(row.matched_filename, "rec.atc");
    logs.assert_no_match("matched only by plain filename");
}

#[tokio::test]
async fn test_missing_store_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let result = MetadataStore::open(&temp_dir.path().join("absent.sqlite"), "enhanced").await;
    assert!(matches!(result, Err(StoreError::StoreMissing(_))));
}

#[tokio::test]
async fn test_store_is_not_modified() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db = create_metadata_store(temp_dir.path(), "alive.sqlite", &[EcgRowFixture::new("a.atc")])
        .await
        .unwrap();
    let before = std::fs::read(&db).unwrap();

    let store = MetadataStore::open(&db, "enhanced").await.unwrap();
    store.lookup("a.atc").await.unwrap();
    assert!(matches!(store.lookup("b.atc").await, Err(StoreError::NotFound(_))));

    assert_eq!(std::fs::read(&db).unwrap(), before);
}
