//! Target registry: the deduplicated set of URLs under monitoring.
//!
//! Identity is the normalized URL. `upsert_target` is idempotent: later
//! observations update metadata but never fork a duplicate row.

use crate::{Result, Store, StorageError};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{OptionalExtension, Row};
use sitemon_common::normalize::normalize;
use sitemon_common::types::{ProbeStatus, Target, TargetKind};

fn row_to_target(row: &Row<'_>) -> rusqlite::Result<Target> {
    let kind: String = row.get(1)?;
    let last_status: Option<String> = row.get(3)?;
    let last_checked_at: Option<i64> = row.get(5)?;
    let created_at: i64 = row.get(6)?;
    let updated_at: i64 = row.get(7)?;
    Ok(Target {
        url: row.get(0)?,
        kind: kind.parse().unwrap_or(TargetKind::AdHocCheck),
        contact_email: row.get(2)?,
        last_status: last_status.and_then(|s| s.parse().ok()),
        last_code: row.get::<_, Option<u16>>(4)?,
        last_checked_at: last_checked_at.and_then(|t| Utc.timestamp_opt(t, 0).single()),
        created_at: Utc.timestamp_opt(created_at, 0).single().unwrap_or_default(),
        updated_at: Utc.timestamp_opt(updated_at, 0).single().unwrap_or_default(),
    })
}

const TARGET_COLUMNS: &str =
    "url, kind, contact_email, last_status, last_code, last_checked_at, created_at, updated_at";

impl Store {
    /// Registers a URL (normalizing it first) or refreshes an existing
    /// registration. At most one row exists per normalized URL regardless
    /// of originating source. An ad-hoc entry is upgraded to tracked-asset
    /// when an asset record later claims the same URL; provenance is never
    /// downgraded.
    pub fn upsert_target(&self, raw_url: &str, kind: TargetKind) -> Result<Target> {
        let url = normalize(raw_url)?;
        let now = Utc::now().timestamp();
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO targets (url, kind, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(url) DO UPDATE SET
                 kind = CASE WHEN targets.kind = 'ad-hoc-check' THEN excluded.kind ELSE targets.kind END,
                 updated_at = excluded.updated_at",
            rusqlite::params![url, kind.to_string(), now],
        )?;
        let target = conn
            .query_row(
                &format!("SELECT {TARGET_COLUMNS} FROM targets WHERE url = ?1"),
                [&url],
                row_to_target,
            )
            .optional()?;
        target.ok_or_else(|| StorageError::InvalidTarget(url))
    }

    /// Reconciles a batch of URLs from one source into the working set.
    /// Malformed entries are dropped with a warning rather than aborting
    /// the merge. Returns the number of entries merged.
    pub fn merge_targets(&self, urls: &[String], kind: TargetKind) -> Result<u32> {
        let mut merged = 0u32;
        for raw in urls {
            match self.upsert_target(raw, kind) {
                Ok(_) => merged += 1,
                Err(StorageError::InvalidTarget(_)) => {
                    tracing::warn!(url = %raw, "Skipping malformed URL during merge");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(merged)
    }

    pub fn get_target(&self, raw_url: &str) -> Result<Option<Target>> {
        let url = normalize(raw_url)?;
        let conn = self.lock_conn();
        let target = conn
            .query_row(
                &format!("SELECT {TARGET_COLUMNS} FROM targets WHERE url = ?1"),
                [&url],
                row_to_target,
            )
            .optional()?;
        Ok(target)
    }

    pub fn list_targets(&self) -> Result<Vec<Target>> {
        let conn = self.lock_conn();
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {TARGET_COLUMNS} FROM targets ORDER BY url"))?;
        let rows = stmt.query_map([], row_to_target)?;
        let mut targets = Vec::new();
        for row in rows {
            targets.push(row?);
        }
        Ok(targets)
    }

    /// Sets or clears the expiry-notification recipient for a target.
    /// Returns false if the target does not exist.
    pub fn set_contact_email(&self, raw_url: &str, email: Option<&str>) -> Result<bool> {
        let url = normalize(raw_url)?;
        let conn = self.lock_conn();
        let updated = conn.execute(
            "UPDATE targets SET contact_email = ?1, updated_at = ?2 WHERE url = ?3",
            rusqlite::params![email, Utc::now().timestamp(), url],
        )?;
        Ok(updated > 0)
    }

    /// Records a check observation against a target. Guarded by
    /// `last_checked_at` so a stale observation (e.g. a manual recheck
    /// racing a scheduled one) never clobbers a newer result. Returns
    /// whether the observation was applied.
    pub fn record_check(
        &self,
        url: &str,
        status: ProbeStatus,
        code: Option<u16>,
        observed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let ts = observed_at.timestamp();
        let conn = self.lock_conn();
        let updated = conn.execute(
            "UPDATE targets SET last_status = ?1, last_code = ?2, last_checked_at = ?3, updated_at = ?3
             WHERE url = ?4 AND (last_checked_at IS NULL OR last_checked_at <= ?3)",
            rusqlite::params![status.to_string(), code, ts, url],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_target(&self, raw_url: &str) -> Result<bool> {
        let url = normalize(raw_url)?;
        let conn = self.lock_conn();
        let deleted = conn.execute("DELETE FROM targets WHERE url = ?1", [&url])?;
        Ok(deleted > 0)
    }
}
