//! Backup, restore and retention for the live database file
//!
//! Snapshots are whole-file copies named `plans_backup_<UTC timestamp>.db`
//! in the configured backup directory; the directory scan is the catalog,
//! so files added or removed out-of-band are picked up on the next call.
//! Every snapshot is integrity-checked right after creation and again
//! before it is ever promoted over the live file.
//!
//! Concurrent invocations of create, restore and sweep are NOT serialized
//! here; callers must not run them against the same database at the same
//! time.

use crate::config::StoreConfig;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Snapshot filename prefix. Files in the backup directory that do not
/// match `plans_backup_*.db` are never listed, restored or swept.
pub const BACKUP_PREFIX: &str = "plans_backup_";

/// Snapshot filename extension
pub const BACKUP_EXTENSION: &str = ".db";

/// Second-precision UTC timestamp embedded in artifact names
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Suffix inserted between the live filename and the timestamp of a
/// pre-restore safety copy. Safety copies do not match the snapshot
/// pattern, so retention never touches them.
const SAFETY_COPY_INFIX: &str = ".safety_backup_";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Database file not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("Backup file not found: {}", .0.display())]
    BackupNotFound(PathBuf),
    #[error("Integrity check failed: {}", .0.display())]
    Corrupt(PathBuf),
    #[error("Invalid backup name: {0}")]
    InvalidName(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A cataloged snapshot. `created_at` and `age_days` come from the
/// filesystem modification time, not the name-embedded timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub age_days: i64,
}

/// Aggregate statistics over the snapshot catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupStats {
    pub total_backups: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub oldest_backup: Option<DateTime<Utc>>,
    pub newest_backup: Option<DateTime<Utc>>,
    pub retention_days: u32,
}

/// Snapshot lifecycle engine for the live database file
pub struct BackupEngine {
    db_path: PathBuf,
    backup_dir: PathBuf,
    retention_days: u32,
}

impl BackupEngine {
    /// Build an engine from configuration, creating the backup directory
    /// if needed.
    pub fn new(config: &StoreConfig) -> Result<Self, BackupError> {
        fs::create_dir_all(&config.backup_dir)?;
        Ok(Self {
            db_path: config.database_path.clone(),
            backup_dir: config.backup_dir.clone(),
            retention_days: config.retention_days,
        })
    }

    /// Snapshot the live database file.
    ///
    /// The copy is integrity-checked immediately; on failure the snapshot
    /// stays on disk and `Corrupt` is returned — deleting it is the
    /// caller's decision. A failed backup never touches the live file.
    pub fn create_backup(&self) -> Result<BackupInfo, BackupError> {
        if !self.db_path.exists() {
            return Err(BackupError::SourceNotFound(self.db_path.clone()));
        }

        // Briefly open and close a connection so the copy does not start
        // in the middle of a write.
        {
            let _conn = Connection::open(&self.db_path)?;
        }

        let timestamp = Utc::now().format(TIMESTAMP_FORMAT);
        let filename = format!("{BACKUP_PREFIX}{timestamp}{BACKUP_EXTENSION}");
        let backup_path = self.backup_dir.join(&filename);

        fs::copy(&self.db_path, &backup_path)?;

        if !Self::verify_backup(&backup_path) {
            return Err(BackupError::Corrupt(backup_path));
        }

        tracing::info!(path = %backup_path.display(), "backup created");
        self.backup_info(&backup_path)
    }

    /// Integrity self-check: open a candidate file read-only and run a full
    /// structural consistency scan. Unopenable or malformed files count as
    /// unhealthy. Shared by backup creation and restore.
    pub fn verify_backup(path: &Path) -> bool {
        match integrity_check(path) {
            Ok(true) => true,
            Ok(false) => {
                tracing::error!(path = %path.display(), "integrity check failed");
                false
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "could not verify file");
                false
            }
        }
    }

    /// Promote a verified snapshot over the live database file.
    ///
    /// The snapshot must verify healthy before the live file is touched.
    /// If a live file exists it is first copied aside as a timestamped
    /// safety copy. A failed post-copy check is reported as `Corrupt` with
    /// no automatic revert — the safety copy is the recovery path, left in
    /// place for the operator.
    pub fn restore_backup(&self, backup_path: &Path) -> Result<(), BackupError> {
        if !backup_path.exists() {
            return Err(BackupError::BackupNotFound(backup_path.to_path_buf()));
        }

        if !Self::verify_backup(backup_path) {
            return Err(BackupError::Corrupt(backup_path.to_path_buf()));
        }

        if self.db_path.exists() {
            let timestamp = Utc::now().format(TIMESTAMP_FORMAT);
            let mut safety = self.db_path.clone().into_os_string();
            safety.push(format!("{SAFETY_COPY_INFIX}{timestamp}"));
            let safety = PathBuf::from(safety);
            fs::copy(&self.db_path, &safety)?;
            tracing::info!(path = %safety.display(), "safety copy created before restore");
        }

        fs::copy(backup_path, &self.db_path)?;

        if !Self::verify_backup(&self.db_path) {
            return Err(BackupError::Corrupt(self.db_path.clone()));
        }

        tracing::info!(
            from = %backup_path.display(),
            to = %self.db_path.display(),
            "backup restored",
        );
        Ok(())
    }

    /// Restore a snapshot by its catalog filename
    pub fn restore_named(&self, name: &str) -> Result<(), BackupError> {
        if name.contains('/') || name.contains('\\') {
            return Err(BackupError::InvalidName(name.to_string()));
        }
        self.restore_backup(&self.backup_dir.join(name))
    }

    /// Delete snapshots older than the retention window, by modification
    /// time. Snapshots are deleted without re-verification (removing a
    /// possibly-corrupt snapshot is always safe). Returns the count
    /// removed. Files not matching the snapshot pattern are never touched.
    pub fn cleanup_old_backups(&self) -> Result<usize, BackupError> {
        if !self.backup_dir.exists() {
            return Ok(0);
        }

        let cutoff = Utc::now() - chrono::Duration::days(i64::from(self.retention_days));
        let mut removed = 0;

        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_backup_filename(&name) || !entry.file_type()?.is_file() {
                continue;
            }

            let modified: DateTime<Utc> = entry.metadata()?.modified()?.into();
            if modified < cutoff {
                fs::remove_file(entry.path())?;
                removed += 1;
                tracing::info!(filename = %name, "removed old backup");
            }
        }

        tracing::info!(removed, "backup cleanup completed");
        Ok(removed)
    }

    /// All cataloged snapshots, newest first. Equal timestamps are
    /// returned in no particular order.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, BackupError> {
        let mut backups = Vec::new();
        if !self.backup_dir.exists() {
            return Ok(backups);
        }

        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_backup_filename(&name) || !entry.file_type()?.is_file() {
                continue;
            }
            backups.push(self.backup_info(&entry.path())?);
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Aggregate statistics; zero counts and absent timestamps on an
    /// empty catalog.
    pub fn stats(&self) -> Result<BackupStats, BackupError> {
        let backups = self.list_backups()?;
        let total_size_bytes: u64 = backups.iter().map(|b| b.size_bytes).sum();
        let total_size_mb =
            (total_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

        Ok(BackupStats {
            total_backups: backups.len(),
            total_size_bytes,
            total_size_mb,
            oldest_backup: backups.last().map(|b| b.created_at),
            newest_backup: backups.first().map(|b| b.created_at),
            retention_days: self.retention_days,
        })
    }

    fn backup_info(&self, path: &Path) -> Result<BackupInfo, BackupError> {
        let metadata = fs::metadata(path)?;
        let created_at: DateTime<Utc> = metadata.modified()?.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(BackupInfo {
            filename,
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
            created_at,
            age_days: (Utc::now() - created_at).num_days(),
        })
    }
}

fn is_backup_filename(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_EXTENSION)
}

fn integrity_check(path: &Path) -> Result<bool, rusqlite::Error> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    // A broken database reports one row per problem; the first row is "ok"
    // only when the whole scan passed.
    let result: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    Ok(result == "ok")
}
