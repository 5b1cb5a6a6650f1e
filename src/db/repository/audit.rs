use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;

/// One audit entry, written in the same transaction as the change it records.
#[derive(Debug, Clone, Default)]
pub struct AuditEntry<'a> {
    pub user_id: Option<&'a str>,
    pub action: &'a str,
    pub resource: &'a str,
    pub ip: Option<&'a str>,
    pub request_id: Option<&'a str>,
    pub old_value: Option<&'a str>,
    pub new_value: Option<&'a str>,
}

pub fn insert_audit(conn: &Connection, entry: &AuditEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (id, user_id, action, resource, ip, request_id,
             old_value, new_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            Uuid::new_v4().to_string(),
            entry.user_id,
            entry.action,
            entry.resource,
            entry.ip,
            entry.request_id,
            entry.old_value,
            entry.new_value,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Prune audit entries older than the given number of days.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).to_rfc3339();
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

/// Audit rows touching one resource, newest first. Returns (action,
/// user_id, request_id) tuples.
pub fn query_by_resource(
    conn: &Connection,
    resource: &str,
) -> Result<Vec<(String, Option<String>, Option<String>)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT action, user_id, request_id FROM audit_log
         WHERE resource = ?1 ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map(params![resource], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
