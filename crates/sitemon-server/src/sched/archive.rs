//! Monthly archive shipping.
//!
//! An hourly tick checks a persisted month marker instead of relying on a
//! cron-style wall clock, so a server that was down at the month boundary
//! still archives on its next tick. The marker is only advanced after the
//! mail goes out; a failed send is retried on every following tick until
//! it succeeds.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sitemon_notify::AlertSink;
use sitemon_storage::Store;
use std::sync::Arc;
use tokio::time::{interval, Duration};

pub const LAST_ARCHIVE_KEY: &str = "last_archive_month";

pub struct ArchiveScheduler {
    store: Arc<Store>,
    sink: Arc<dyn AlertSink>,
    recipient: String,
    tick_secs: u64,
}

/// True when no archive has been shipped for the month containing `now`.
pub fn should_archive(last_mark: Option<&str>, now: DateTime<Utc>) -> bool {
    let month = now.format("%Y-%m").to_string();
    last_mark != Some(month.as_str())
}

impl ArchiveScheduler {
    pub fn new(store: Arc<Store>, sink: Arc<dyn AlertSink>, recipient: String, tick_secs: u64) -> Self {
        Self {
            store,
            sink,
            recipient,
            tick_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            tick_secs = self.tick_secs,
            recipient = %self.recipient,
            "Archive scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.run_cycle(Utc::now()).await {
                tracing::error!(error = %e, "Archive cycle failed, will retry next tick");
            }
        }
    }

    /// Archives and mails the incident logs if the month containing `now`
    /// has not been shipped yet. The month marker is persisted only after
    /// a successful send.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<()> {
        let mark = self.store.get_meta(LAST_ARCHIVE_KEY)?;
        if !should_archive(mark.as_deref(), now) {
            return Ok(());
        }

        let bundle = self.store.archive_incidents(now)?;
        self.sink
            .send_archive(&self.recipient, &bundle.filename, &bundle.bytes)
            .await?;
        self.store.set_meta(LAST_ARCHIVE_KEY, &bundle.month)?;

        tracing::info!(
            month = %bundle.month,
            recipient = %self.recipient,
            live = bundle.live_count,
            backup = bundle.backup_count,
            "Shipped monthly incident archive"
        );
        Ok(())
    }
}
