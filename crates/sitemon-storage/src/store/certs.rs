//! Certificate table: one live row per URL, overwritten in place on every
//! recheck. Unlike the incident log this is not historical.

use crate::{Result, Store};
use chrono::{TimeZone, Utc};
use rusqlite::{OptionalExtension, Row};
use sitemon_common::types::CertificateRecord;

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CertificateRecord> {
    let valid_from: Option<i64> = row.get(4)?;
    let valid_to: Option<i64> = row.get(5)?;
    let checked_at: i64 = row.get(9)?;
    Ok(CertificateRecord {
        url: row.get(0)?,
        subject_cn: row.get(1)?,
        issuer_cn: row.get(2)?,
        issuer_o: row.get(3)?,
        valid_from: valid_from.and_then(|t| Utc.timestamp_opt(t, 0).single()),
        valid_to: valid_to.and_then(|t| Utc.timestamp_opt(t, 0).single()),
        currently_valid: row.get::<_, i64>(6)? != 0,
        days_left: row.get(7)?,
        error: row.get(8)?,
        checked_at: Utc.timestamp_opt(checked_at, 0).single().unwrap_or_default(),
    })
}

const CERT_COLUMNS: &str = "url, subject_cn, issuer_cn, issuer_o, valid_from, valid_to, \
                            currently_valid, days_left, error, checked_at";

impl Store {
    /// Writes the latest certificate facts for a URL, replacing any
    /// previous row.
    pub fn upsert_certificate(&self, rec: &CertificateRecord) -> Result<()> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT OR REPLACE INTO certificates
             (url, subject_cn, issuer_cn, issuer_o, valid_from, valid_to,
              currently_valid, days_left, error, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                rec.url,
                rec.subject_cn,
                rec.issuer_cn,
                rec.issuer_o,
                rec.valid_from.map(|t| t.timestamp()),
                rec.valid_to.map(|t| t.timestamp()),
                rec.currently_valid as i64,
                rec.days_left,
                rec.error,
                rec.checked_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    pub fn get_certificate(&self, url: &str) -> Result<Option<CertificateRecord>> {
        let conn = self.lock_conn();
        let rec = conn
            .query_row(
                &format!("SELECT {CERT_COLUMNS} FROM certificates WHERE url = ?1"),
                [url],
                row_to_record,
            )
            .optional()?;
        Ok(rec)
    }

    pub fn list_certificates(&self) -> Result<Vec<CertificateRecord>> {
        let conn = self.lock_conn();
        let mut stmt = conn
            .prepare_cached(&format!("SELECT {CERT_COLUMNS} FROM certificates ORDER BY url"))?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
