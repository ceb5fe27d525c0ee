//! Common test utilities for planvault integration tests
//!
//! Provides a context bundling a temp directory, an initialized database
//! and a config whose paths all live inside the temp directory.

use planvault_lib::config::StoreConfig;
use planvault_lib::db::Database;
use planvault_lib::evidence::{self, EvidenceError, UploadOutcome};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Build a config rooted in a test directory
pub fn test_config(root: &Path) -> StoreConfig {
    StoreConfig {
        database_path: root.join("plans.db"),
        backup_dir: root.join("backups"),
        upload_dir: root.join("uploads"),
        retention_days: 30,
        max_upload_bytes: 1024 * 1024,
    }
}

/// Test context holding temporary resources
#[allow(dead_code)]
pub struct TestContext {
    pub temp_dir: TempDir,
    pub config: StoreConfig,
    pub db: Database,
    pub db_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let config = test_config(temp_dir.path());
        let db_path = config.database_path.clone();
        let db = Database::open(&db_path)?;
        db.initialize()?;

        Ok(Self {
            temp_dir,
            config,
            db,
            db_path,
        })
    }

    /// Upload in-memory bytes through the full ingestion pipeline
    pub fn upload(
        &self,
        plan_id: i64,
        filename: &str,
        content_type: Option<&str>,
        content: &[u8],
    ) -> Result<UploadOutcome, EvidenceError> {
        evidence::ingest_evidence(
            &self.db,
            &self.config,
            plan_id,
            filename,
            content_type,
            Cursor::new(content.to_vec()),
        )
    }

    /// Files currently present in the upload directory
    pub fn uploaded_files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.config.upload_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
