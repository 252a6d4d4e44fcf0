//! Incident history: an append-only live log with a rolling retention
//! window, backed by a cold backup log.
//!
//! `append_incident` runs the retention sweep synchronously after every
//! write, so the live log never silently exceeds its window even under
//! bursty writes. The sweep moves aged entries live -> backup as
//! copy-then-delete: the copy is an `INSERT OR REPLACE` keyed by id, so an
//! interrupted move can leave an entry in both logs (transient duplication)
//! but never in neither, and re-running the sweep converges.

use crate::{Result, Store};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{Connection, Row};
use sitemon_common::types::{IncidentLogEntry, NewIncident, ProbeStatus};

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<IncidentLogEntry> {
    let status: String = row.get(2)?;
    let time: i64 = row.get(5)?;
    Ok(IncidentLogEntry {
        id: row.get(0)?,
        url: row.get(1)?,
        status: status.parse().unwrap_or(ProbeStatus::Error),
        message: row.get(3)?,
        code: row.get::<_, Option<u16>>(4)?,
        time: Utc.timestamp_opt(time, 0).single().unwrap_or_default(),
    })
}

/// Filters for querying the live incident log.
#[derive(Debug, Clone)]
pub struct IncidentQuery {
    pub url_contains: Option<String>,
    pub status: Option<ProbeStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for IncidentQuery {
    fn default() -> Self {
        Self {
            url_contains: None,
            status: None,
            from: None,
            to: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl Store {
    /// Appends a check result to the live log, assigning the id and (when
    /// absent) the timestamp at write time, then enforces retention.
    pub fn append_incident(&self, incident: NewIncident) -> Result<IncidentLogEntry> {
        let entry = IncidentLogEntry {
            id: sitemon_common::id::next_id(),
            url: incident.url,
            status: incident.status,
            message: incident.message,
            code: incident.code,
            time: incident.time.unwrap_or_else(Utc::now),
        };
        {
            let conn = self.lock_conn();
            conn.execute(
                "INSERT INTO incidents_live (id, url, status, message, code, time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    entry.id,
                    entry.url,
                    entry.status.to_string(),
                    entry.message,
                    entry.code,
                    entry.time.timestamp(),
                ],
            )?;
        }
        self.sweep()?;
        Ok(entry)
    }

    /// Moves entries older than the retention window from the live log to
    /// the backup log. Idempotent: a second run with no new writes is a
    /// no-op. Returns the number of entries copied to backup.
    pub fn sweep(&self) -> Result<u32> {
        let cutoff = self.sweep_cutoff();
        let conn = self.lock_conn();
        let moved = Self::copy_aged_to_backup(&conn, cutoff)?;
        Self::purge_aged_from_live(&conn, cutoff)?;
        if moved > 0 {
            tracing::info!(moved, cutoff = %cutoff, "Moved aged incidents to backup log");
        }
        Ok(moved)
    }

    pub(crate) fn sweep_cutoff(&self) -> DateTime<Utc> {
        Utc::now() - Duration::days(self.retention_days() as i64)
    }

    /// First half of the move. Keyed `INSERT OR REPLACE` so a re-run after
    /// an interrupted sweep does not duplicate rows in the backup log.
    pub(crate) fn copy_aged_to_backup(conn: &Connection, cutoff: DateTime<Utc>) -> Result<u32> {
        let copied = conn.execute(
            "INSERT OR REPLACE INTO incidents_backup (id, url, status, message, code, time)
             SELECT id, url, status, message, code, time FROM incidents_live WHERE time < ?1",
            [cutoff.timestamp()],
        )?;
        Ok(copied as u32)
    }

    /// Second half of the move.
    pub(crate) fn purge_aged_from_live(conn: &Connection, cutoff: DateTime<Utc>) -> Result<u32> {
        let purged = conn.execute(
            "DELETE FROM incidents_live WHERE time < ?1",
            [cutoff.timestamp()],
        )?;
        Ok(purged as u32)
    }

    /// Queries the live log, newest first.
    pub fn query_incidents(&self, query: &IncidentQuery) -> Result<Vec<IncidentLogEntry>> {
        let mut sql =
            String::from("SELECT id, url, status, message, code, time FROM incidents_live WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref url) = query.url_contains {
            params.push(Box::new(format!("%{url}%")));
            sql.push_str(&format!(" AND url LIKE ?{}", params.len()));
        }
        if let Some(status) = query.status {
            params.push(Box::new(status.to_string()));
            sql.push_str(&format!(" AND status = ?{}", params.len()));
        }
        if let Some(from) = query.from {
            params.push(Box::new(from.timestamp()));
            sql.push_str(&format!(" AND time >= ?{}", params.len()));
        }
        if let Some(to) = query.to {
            params.push(Box::new(to.timestamp()));
            sql.push_str(&format!(" AND time <= ?{}", params.len()));
        }
        sql.push_str(&format!(
            " ORDER BY time DESC LIMIT {} OFFSET {}",
            query.limit, query.offset
        ));

        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Returns the full backup (cold) log, newest first.
    pub fn query_backup_incidents(&self) -> Result<Vec<IncidentLogEntry>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, url, status, message, code, time FROM incidents_backup ORDER BY time DESC",
        )?;
        let rows = stmt.query_map([], row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Operator action: removes a single entry from the live log.
    pub fn delete_incident(&self, id: i64) -> Result<bool> {
        let conn = self.lock_conn();
        let deleted = conn.execute("DELETE FROM incidents_live WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    /// All live entries, oldest first. Used by the archive bundler.
    pub(crate) fn all_live_incidents(&self) -> Result<Vec<IncidentLogEntry>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, url, status, message, code, time FROM incidents_live ORDER BY time ASC",
        )?;
        let rows = stmt.query_map([], row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// All backup entries, oldest first. Used by the archive bundler.
    pub(crate) fn all_backup_incidents(&self) -> Result<Vec<IncidentLogEntry>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, url, status, message, code, time FROM incidents_backup ORDER BY time ASC",
        )?;
        let rows = stmt.query_map([], row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
