//! Monthly cold archival of the incident logs.
//!
//! The live and backup logs are bundled into a single compressed,
//! timestamped snapshot under `data_dir/archives/`. Archival is independent
//! of retention: it never moves or deletes log entries.

use crate::{Result, Store};
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use sitemon_common::types::IncidentLogEntry;
use std::io::Write;
use std::path::PathBuf;

#[derive(Serialize)]
struct Snapshot<'a> {
    generated_at: DateTime<Utc>,
    live: &'a [IncidentLogEntry],
    backup: &'a [IncidentLogEntry],
}

/// A written archive snapshot, with the compressed bytes retained so the
/// caller can mail the artifact off-box.
#[derive(Debug, Clone)]
pub struct ArchiveBundle {
    /// Month key the snapshot belongs to, `YYYY-MM`.
    pub month: String,
    pub filename: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub live_count: usize,
    pub backup_count: usize,
}

impl Store {
    /// Bundles the live and backup incident logs into a gzip JSON snapshot
    /// for the month containing `now` and writes it to disk. Re-archiving
    /// the same month overwrites the snapshot file.
    pub fn archive_incidents(&self, now: DateTime<Utc>) -> Result<ArchiveBundle> {
        let live = self.all_live_incidents()?;
        let backup = self.all_backup_incidents()?;

        let snapshot = Snapshot {
            generated_at: now,
            live: &live,
            backup: &backup,
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let bytes = encoder.finish()?;

        let month = now.format("%Y-%m").to_string();
        let filename = format!("incidents-{month}.json.gz");
        let archive_dir = self.data_dir.join("archives");
        std::fs::create_dir_all(&archive_dir)?;
        let path = archive_dir.join(&filename);
        std::fs::write(&path, &bytes)?;

        tracing::info!(
            path = %path.display(),
            live = live.len(),
            backup = backup.len(),
            compressed_bytes = bytes.len(),
            "Wrote incident archive snapshot"
        );

        Ok(ArchiveBundle {
            month,
            filename,
            path,
            bytes,
            live_count: live.len(),
            backup_count: backup.len(),
        })
    }
}
