//! Metadata store fixtures
//!
//! Builds a file-backed SQLite store with the device-app `ZECG` schema, so the code under
//! test can open it read-only by path like a real export.

use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

/// One `ZECG` row to insert
#[derive(Debug, Clone)]
pub struct EcgRowFixture {
    pub filename: String,
    pub enhanced_filename: Option<String>,
    pub duration_ms: i64,
    /// Seconds since 2001-01-01T00:00:00Z
    pub date_recorded: i64,
    pub heart_rate: f64,
    pub comment: Option<String>,
}

impl EcgRowFixture {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            enhanced_filename: None,
            duration_ms: 30_000,
            date_recorded: 581_083_200,
            heart_rate: 72.0,
            comment: None,
        }
    }

    pub fn enhanced(mut self, enhanced_filename: &str) -> Self {
        self.enhanced_filename = Some(enhanced_filename.to_string());
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Create `<dir>/<name>` holding a `ZECG` table with `rows`
pub async fn create_metadata_store(dir: &Path, name: &str, rows: &[EcgRowFixture]) -> Result<PathBuf> {
    let db_path = dir.join(name);
    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true),
    )
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE ZECG (
            Z_PK INTEGER PRIMARY KEY,
            ZDURATION_MS INTEGER,
            ZDATERECORDED INTEGER,
            ZDATERECORDEDWITHOFFSET INTEGER,
            ZHEARTRATE REAL,
            ZCOMMENT TEXT,
            ZFILENAME TEXT,
            ZENHANCEDFILENAME TEXT
        )
        "#,
    )
    .execute(&pool)
    .await?;

    for row in rows {
        sqlx::query(
            "INSERT INTO ZECG (ZDURATION_MS, ZDATERECORDED, ZDATERECORDEDWITHOFFSET, ZHEARTRATE, \
             ZCOMMENT, ZFILENAME, ZENHANCEDFILENAME) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(row.duration_ms)
        .bind(row.date_recorded)
        .bind(row.date_recorded + 7200)
        .bind(row.heart_rate)
        .bind(&row.comment)
        .bind(&row.filename)
        .bind(&row.enhanced_filename)
        .execute(&pool)
        .await?;
    }

    pool.close().await;
    Ok(db_path)
}
