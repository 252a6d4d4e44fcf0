mod certs;
mod incident;
mod registry;

pub use incident::IncidentQuery;

use crate::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const TARGETS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS targets (
    url TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    contact_email TEXT,
    last_status TEXT,
    last_code INTEGER,
    last_checked_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_targets_kind ON targets(kind);
";

const CERTIFICATES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS certificates (
    url TEXT PRIMARY KEY,
    subject_cn TEXT,
    issuer_cn TEXT,
    issuer_o TEXT,
    valid_from INTEGER,
    valid_to INTEGER,
    currently_valid INTEGER NOT NULL DEFAULT 0,
    days_left INTEGER,
    error TEXT,
    checked_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_certificates_valid_to ON certificates(valid_to);
";

const INCIDENTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS incidents_live (
    id INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    message TEXT NOT NULL,
    code INTEGER,
    time INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_incidents_live_time ON incidents_live(time);
CREATE INDEX IF NOT EXISTS idx_incidents_live_url ON incidents_live(url);
CREATE TABLE IF NOT EXISTS incidents_backup (
    id INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    message TEXT NOT NULL,
    code INTEGER,
    time INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_incidents_backup_time ON incidents_backup(time);
";

const META_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
";

/// The single persistence handle for the monitoring engine: target
/// registry, certificate table, live/backup incident logs, and the meta
/// table used by the archive scheduler.
pub struct Store {
    conn: Mutex<Connection>,
    pub(crate) data_dir: PathBuf,
    retention_days: u32,
}

impl Store {
    /// Opens (creating if necessary) `sitemon.db` under `data_dir`.
    /// `retention_days` is the live incident window; aged entries are
    /// moved to the backup log by [`Store::sweep`].
    pub fn open(data_dir: &Path, retention_days: u32) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("sitemon.db");
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(TARGETS_SCHEMA)?;
        conn.execute_batch(CERTIFICATES_SCHEMA)?;
        conn.execute_batch(INCIDENTS_SCHEMA)?;
        conn.execute_batch(META_SCHEMA)?;
        tracing::info!(path = %db_path.display(), retention_days, "Initialized store");
        Ok(Self {
            conn: Mutex::new(conn),
            data_dir: data_dir.to_path_buf(),
            retention_days,
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    pub(crate) fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        use rusqlite::OptionalExtension;
        let conn = self.lock_conn();
        let value = conn
            .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO meta (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }
}
