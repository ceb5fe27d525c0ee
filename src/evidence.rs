//! Evidence ingestion pipeline
//!
//! Validates, hashes, deduplicates and persists uploaded binary attachments
//! for a plan. The content stream is consumed in fixed-size chunks against a
//! running byte counter, so an oversized body is rejected the moment it
//! crosses the cap instead of after being buffered in full. A record is
//! inserted only after its bytes are fully on disk.

use crate::audit;
use crate::config::StoreConfig;
use crate::db::{Database, EvidenceRecord};
use crate::validation::{self, ValidationError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Upload streams are consumed in chunks of this size
const READ_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("Plan not found: {0}")]
    PlanNotFound(i64),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("File too large. Maximum size: {max_bytes} bytes")]
    PayloadTooLarge { max_bytes: u64 },
    #[error("An error occurred while storing the file. Please try again.")]
    Internal,
}

/// Result of a successful upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub id: String,
    /// Name the bytes were actually stored under (may carry a collision suffix)
    pub filename: String,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Ingest one uploaded evidence file for a plan.
///
/// Validation order: plan existence, filename, extension allow-list,
/// declared content type. Each failure is hard, with no partial side
/// effect. On success exactly one file write (skipped when an identical
/// blob is already stored), one record insert and one audit entry happen.
pub fn ingest_evidence(
    db: &Database,
    config: &StoreConfig,
    plan_id: i64,
    filename: &str,
    content_type: Option<&str>,
    mut content_stream: impl Read,
) -> Result<UploadOutcome, EvidenceError> {
    let plan_found = db
        .plan_exists(plan_id)
        .map_err(|e| internal(db, plan_id, filename, &e.to_string()))?;
    if !plan_found {
        return Err(EvidenceError::PlanNotFound(plan_id));
    }

    validation::validate_filename(filename)?;
    validation::validate_content_type(content_type)?;

    // Size-guarded streaming read. The read is abandoned the instant the
    // running total would cross the cap; nothing has been written yet.
    let mut content: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let n = content_stream
            .read(&mut chunk)
            .map_err(|e| internal(db, plan_id, filename, &e.to_string()))?;
        if n == 0 {
            break;
        }
        if (content.len() + n) as u64 > config.max_upload_bytes {
            return Err(EvidenceError::PayloadTooLarge {
                max_bytes: config.max_upload_bytes,
            });
        }
        content.extend_from_slice(&chunk[..n]);
    }

    if content.is_empty() {
        return Err(ValidationError::EmptyFile.into());
    }

    let sha256 = hex::encode(Sha256::digest(&content));

    let sanitized = validation::sanitize_filename(filename);
    if sanitized.is_empty() {
        return Err(ValidationError::EmptyFilename.into());
    }

    fs::create_dir_all(&config.upload_dir)
        .map_err(|e| internal(db, plan_id, filename, &e.to_string()))?;

    let (stored_name, target, write_needed) =
        resolve_storage_path(&config.upload_dir, &sanitized, &sha256)
            .map_err(|e| internal(db, plan_id, filename, &e.to_string()))?;

    if write_needed {
        fs::write(&target, &content)
            .map_err(|e| internal(db, plan_id, filename, &e.to_string()))?;
    }

    let record = EvidenceRecord {
        id: Uuid::new_v4().to_string(),
        plan_id,
        filename: stored_name,
        sha256,
        size_bytes: content.len() as u64,
        created_at: Utc::now(),
    };
    db.insert_evidence(&record)
        .map_err(|e| internal(db, plan_id, filename, &e.to_string()))?;

    let detail = format!(
        "{} {} ({} bytes)",
        record.filename, record.sha256, record.size_bytes
    );
    if let Err(e) = audit::log(db, "upload_evidence", &detail, Some(plan_id)) {
        tracing::warn!(plan_id, error = %e, "audit entry for upload could not be written");
    }

    Ok(UploadOutcome {
        id: record.id,
        filename: record.filename,
        sha256: record.sha256,
        size_bytes: record.size_bytes,
    })
}

/// Decide where the bytes go and whether a write is needed.
///
/// Same name, identical hash: the blob is already stored, skip the write.
/// Same name, different hash: append `_1`, `_2`, ... before the extension
/// until an unused path is found.
fn resolve_storage_path(
    upload_dir: &Path,
    sanitized: &str,
    sha256: &str,
) -> std::io::Result<(String, PathBuf, bool)> {
    let target = upload_dir.join(sanitized);
    if !target.exists() {
        return Ok((sanitized.to_string(), target, true));
    }

    if hash_file(&target)? == sha256 {
        return Ok((sanitized.to_string(), target, false));
    }

    let path = Path::new(sanitized);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(sanitized);
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = format!("{stem}_{counter}{ext}");
        let candidate_path = upload_dir.join(&candidate);
        if !candidate_path.exists() {
            return Ok((candidate, candidate_path, true));
        }
        counter += 1;
    }
}

/// SHA-256 of a file already on disk, hex-encoded
fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Log an unexpected failure with context and convert it to the generic
/// internal error surfaced to callers. Raw detail goes to the log and the
/// audit trail, never to the caller.
fn internal(db: &Database, plan_id: i64, filename: &str, detail: &str) -> EvidenceError {
    tracing::error!(plan_id, filename, detail, "evidence upload failed");
    let audit_detail = format!("Error uploading {filename}: {detail}");
    if let Err(e) = audit::log(db, "upload_error", &audit_detail, Some(plan_id)) {
        tracing::warn!(plan_id, error = %e, "audit entry for failed upload could not be written");
    }
    EvidenceError::Internal
}
