//! Audit trail for planvault
//!
//! Append-only `audit_logs` table recording who did what to which plan.
//! Evidence ingestion writes here on every upload; readers get events
//! newest first. Audit failures are logged and swallowed by callers on
//! otherwise-successful operations, so a broken trail never blocks an
//! upload that already persisted its bytes.

use crate::db::{Database, DbError};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// Actor recorded when the caller supplies none
const DEFAULT_ACTOR: &str = "analyst";

/// A single audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub plan_id: Option<i64>,
    pub action: String,
    pub detail: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

/// Record an audit event
pub fn log(
    db: &Database,
    action: &str,
    detail: &str,
    plan_id: Option<i64>,
) -> Result<(), DbError> {
    db.conn().execute(
        "INSERT INTO audit_logs (plan_id, action, detail, actor, created_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
            plan_id,
            action,
            detail,
            DEFAULT_ACTOR,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Most recent audit events, newest first
pub fn recent(db: &Database, limit: usize) -> Result<Vec<AuditEvent>, DbError> {
    let mut stmt = db.conn().prepare(
        "SELECT id, plan_id, action, detail, actor, created_at
         FROM audit_logs ORDER BY id DESC LIMIT ?",
    )?;

    let events = stmt
        .query_map(params![limit as i64], |row| {
            let created_at: String = row.get(5)?;
            Ok(AuditEvent {
                id: row.get(0)?,
                plan_id: row.get(1)?,
                action: row.get(2)?,
                detail: row.get(3)?,
                actor: row.get(4)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            5,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}
