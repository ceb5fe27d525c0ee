//! Process-wide configuration for the durability subsystem
//!
//! All limits and paths are read from the environment exactly once, at
//! startup, and handed to each component as an explicit value. Tests build
//! a `StoreConfig` directly with whatever limits they need.

use std::env;
use std::path::PathBuf;

/// Default maximum upload size (50MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Default backup retention window in days
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Configuration for the evidence store and backup lifecycle
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the live SQLite database file
    pub database_path: PathBuf,
    /// Directory where backup snapshots are written
    pub backup_dir: PathBuf,
    /// Directory where uploaded evidence files are stored
    pub upload_dir: PathBuf,
    /// Snapshots older than this many days are deletion-eligible
    pub retention_days: u32,
    /// Hard cap on a single evidence upload, in bytes
    pub max_upload_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("plans.db"),
            backup_dir: PathBuf::from("backups"),
            upload_dir: PathBuf::from("uploads"),
            retention_days: DEFAULT_RETENTION_DAYS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl StoreConfig {
    /// Build a configuration from the environment.
    ///
    /// Recognized variables: `DATABASE_PATH`, `BACKUP_DIR`, `UPLOAD_DIR`,
    /// `BACKUP_RETENTION_DAYS`, `MAX_FILE_SIZE` (bytes). Unset or
    /// unparseable values fall back to the defaults above.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_path: env::var_os("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            backup_dir: env::var_os("BACKUP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.backup_dir),
            upload_dir: env::var_os("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            retention_days: env::var("BACKUP_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retention_days),
            max_upload_bytes: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
        }
    }
}
