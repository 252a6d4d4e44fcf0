//! Monthly archive shipping: once per month, retried until the mail goes
//! out.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sitemon_common::types::{CertificateRecord, NewIncident, ProbeStatus};
use sitemon_notify::{AlertSink, NotifyError};
use sitemon_server::sched::archive::{ArchiveScheduler, LAST_ARCHIVE_KEY};
use sitemon_storage::Store;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct MockSink {
    sent: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl MockSink {
    fn record(&self, entry: String) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Smtp("simulated delivery failure".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
        Ok(())
    }

    fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl AlertSink for MockSink {
    async fn notify_expiry(
        &self,
        recipient: &str,
        cert: &CertificateRecord,
    ) -> Result<(), NotifyError> {
        self.record(format!("expiry:{recipient}:{}", cert.url))
    }

    async fn send_archive(
        &self,
        recipient: &str,
        filename: &str,
        _bytes: &[u8],
    ) -> Result<(), NotifyError> {
        self.record(format!("archive:{recipient}:{filename}"))
    }

    fn sink_name(&self) -> &str {
        "mock"
    }
}

fn setup_store(dir: &TempDir) -> Arc<Store> {
    sitemon_common::id::init(1, 1);
    let store = Arc::new(Store::open(dir.path(), 30).unwrap());
    store
        .upsert_target("example.com", sitemon_common::types::TargetKind::TrackedAsset)
        .unwrap();
    store
        .append_incident(NewIncident {
            url: "example.com".to_string(),
            status: ProbeStatus::Inactive,
            message: "Connection refused".to_string(),
            code: None,
            time: None,
        })
        .unwrap();
    store
}

#[tokio::test]
async fn ships_once_per_month() {
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);
    let sink = Arc::new(MockSink::default());
    let scheduler = ArchiveScheduler::new(
        store.clone(),
        sink.clone(),
        "ops@example.com".to_string(),
        3600,
    );

    let march = Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
    scheduler.run_cycle(march).await.unwrap();
    assert_eq!(
        sink.sent(),
        vec!["archive:ops@example.com:incidents-2025-03.json.gz"]
    );
    assert_eq!(
        store.get_meta(LAST_ARCHIVE_KEY).unwrap().as_deref(),
        Some("2025-03")
    );

    // Later ticks in the same month are no-ops.
    let later = Utc.with_ymd_and_hms(2025, 3, 28, 9, 0, 0).unwrap();
    scheduler.run_cycle(later).await.unwrap();
    assert_eq!(sink.sent().len(), 1);

    let april = Utc.with_ymd_and_hms(2025, 4, 1, 1, 0, 0).unwrap();
    scheduler.run_cycle(april).await.unwrap();
    let sent = sink.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1], "archive:ops@example.com:incidents-2025-04.json.gz");
}

#[tokio::test]
async fn failed_send_is_retried_on_the_next_tick() {
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);
    let sink = Arc::new(MockSink::default());
    sink.fail.store(true, Ordering::SeqCst);
    let scheduler = ArchiveScheduler::new(
        store.clone(),
        sink.clone(),
        "ops@example.com".to_string(),
        3600,
    );

    let now = Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
    assert!(scheduler.run_cycle(now).await.is_err());
    assert!(sink.sent().is_empty());
    assert!(store.get_meta(LAST_ARCHIVE_KEY).unwrap().is_none());

    sink.fail.store(false, Ordering::SeqCst);
    scheduler.run_cycle(now).await.unwrap();
    assert_eq!(sink.sent().len(), 1);
    assert_eq!(
        store.get_meta(LAST_ARCHIVE_KEY).unwrap().as_deref(),
        Some("2025-03")
    );
}
