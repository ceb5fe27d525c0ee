//! Database module for planvault
//!
//! Owns the live SQLite file the backup engine snapshots: schema creation,
//! the plan-existence lookup consumed by evidence ingestion, evidence-record
//! storage, and the structural integrity check run at startup.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS plans (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evidences (
  id TEXT PRIMARY KEY,
  plan_id INTEGER NOT NULL,
  filename TEXT NOT NULL,
  sha256 TEXT NOT NULL,
  size INTEGER NOT NULL,
  created_at TEXT NOT NULL,
  FOREIGN KEY (plan_id) REFERENCES plans(id)
);
CREATE INDEX IF NOT EXISTS idx_evidences_plan ON evidences(plan_id);

CREATE TABLE IF NOT EXISTS audit_logs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  plan_id INTEGER,
  action TEXT NOT NULL,
  detail TEXT NOT NULL,
  actor TEXT NOT NULL,
  created_at TEXT NOT NULL
);
";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Database corruption detected")]
    Corruption,
}

/// An uploaded evidence file attached to a plan.
///
/// Immutable once created; `sha256` always equals the SHA-256 of the bytes
/// stored under `filename` in the upload directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: String,
    pub plan_id: i64,
    pub filename: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Database manager for planvault
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open or create the database.
    ///
    /// Uses the default rollback journal, not WAL: the backup engine
    /// snapshots the database as a single file, so committed state must
    /// live in the main db file.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Initialize the schema (idempotent) after verifying the file is sound.
    pub fn initialize(&self) -> Result<(), DbError> {
        self.check_integrity()?;
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Check database integrity
    pub fn check_integrity(&self) -> Result<(), DbError> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;

        if result != "ok" {
            return Err(DbError::Corruption);
        }

        Ok(())
    }

    /// Path of the live database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw connection access for collaborating modules
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Create a plan row. Plan content is the editing UI's business; this
    /// stores the minimum the durability core needs to anchor evidence.
    pub fn create_plan(&self, title: &str) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO plans (title, created_at) VALUES (?, ?)",
            params![title, Utc::now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Plan-existence lookup keyed by plan id
    pub fn plan_exists(&self, plan_id: i64) -> Result<bool, DbError> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM plans WHERE id = ?", params![plan_id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert an evidence record. Callers must only do this after the bytes
    /// it references have been fully written.
    pub fn insert_evidence(&self, record: &EvidenceRecord) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO evidences (id, plan_id, filename, sha256, size, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.id,
                record.plan_id,
                record.filename,
                record.sha256,
                record.size_bytes as i64,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All evidence records attached to a plan, oldest first
    pub fn evidence_for_plan(&self, plan_id: i64) -> Result<Vec<EvidenceRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, plan_id, filename, sha256, size, created_at
             FROM evidences WHERE plan_id = ? ORDER BY created_at ASC",
        )?;

        let records = stmt
            .query_map(params![plan_id], |row| {
                let size: i64 = row.get(4)?;
                let created_at: String = row.get(5)?;
                Ok(EvidenceRecord {
                    id: row.get(0)?,
                    plan_id: row.get(1)?,
                    filename: row.get(2)?,
                    sha256: row.get(3)?,
                    size_bytes: size as u64,
                    created_at: parse_timestamp(5, &created_at)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
