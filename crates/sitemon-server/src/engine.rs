//! The monitoring engine: the one place that ties probing, the store, and
//! the alert sink together. Schedulers and any future API surface call
//! through here rather than touching the store directly for check flows.

use crate::probe::cert::{self, CertError};
use crate::probe::reach::{self, ReachPolicy};
use anyhow::Result;
use chrono::Utc;
use sitemon_common::normalize::normalize;
use sitemon_common::types::{
    CertificateRecord, CheckResult, IncidentLogEntry, NewIncident, ProbeStatus, Target, TargetKind,
};
use sitemon_notify::AlertSink;
use sitemon_storage::{IncidentQuery, Store};
use std::sync::Arc;

pub struct Engine {
    store: Arc<Store>,
    sink: Option<Arc<dyn AlertSink>>,
    reach_policy: ReachPolicy,
    cert_timeout_secs: u64,
    alert_threshold_days: i64,
}

impl Engine {
    pub fn new(
        store: Arc<Store>,
        sink: Option<Arc<dyn AlertSink>>,
        reach_policy: ReachPolicy,
        cert_timeout_secs: u64,
        alert_threshold_days: i64,
    ) -> Self {
        Self {
            store,
            sink,
            reach_policy,
            cert_timeout_secs,
            alert_threshold_days,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Registers a URL as an explicitly tracked asset.
    pub fn register_target(&self, raw_url: &str) -> Result<Target> {
        Ok(self.store.upsert_target(raw_url, TargetKind::TrackedAsset)?)
    }

    /// Reconciles a batch of asset URLs into the working set, skipping
    /// malformed entries.
    pub fn register_targets(&self, urls: &[String]) -> Result<u32> {
        Ok(self.store.merge_targets(urls, TargetKind::TrackedAsset)?)
    }

    pub fn list_targets(&self) -> Result<Vec<Target>> {
        Ok(self.store.list_targets()?)
    }

    pub fn set_contact_email(&self, raw_url: &str, email: Option<&str>) -> Result<bool> {
        Ok(self.store.set_contact_email(raw_url, email)?)
    }

    pub fn delete_target(&self, raw_url: &str) -> Result<bool> {
        Ok(self.store.delete_target(raw_url)?)
    }

    /// On-demand reachability check. Registers the URL as an ad-hoc
    /// target (unless blank), probes it, and records the outcome in both
    /// the incident history and the registry.
    pub async fn check_reachability(&self, raw_url: &str) -> Result<CheckResult> {
        if raw_url.trim().is_empty() {
            let result = CheckResult {
                url: raw_url.to_string(),
                status: ProbeStatus::Error,
                http_code: None,
                message: "No URL provided".to_string(),
                observed_at: Utc::now(),
            };
            self.append_result(&result)?;
            return Ok(result);
        }

        let target = self.store.upsert_target(raw_url, TargetKind::AdHocCheck)?;
        self.recheck_target(&target.url).await
    }

    /// Probes an already-registered (normalized) target and records the
    /// outcome.
    pub async fn recheck_target(&self, url: &str) -> Result<CheckResult> {
        let result = reach::probe(&self.reach_policy, url).await;
        self.append_result(&result)?;
        let applied = self.store.record_check(
            &result.url,
            result.status,
            result.http_code,
            result.observed_at,
        )?;
        if !applied {
            tracing::debug!(url = %result.url, "Dropped stale check observation");
        }
        Ok(result)
    }

    fn append_result(&self, result: &CheckResult) -> Result<()> {
        self.store.append_incident(NewIncident {
            url: result.url.clone(),
            status: result.status,
            message: result.message.clone(),
            code: result.http_code,
            time: Some(result.observed_at),
        })?;
        Ok(())
    }

    /// On-demand certificate inspection. A host with no certificate or a
    /// malformed URL is reported as an error to the caller; transient
    /// failures (unreachable, handshake timeout) degrade to a stored
    /// pending record like the scheduled path.
    pub async fn inspect_certificate(&self, raw_url: &str) -> Result<CertificateRecord> {
        let target = normalize(raw_url).map_err(CertError::from)?;
        let record = match cert::inspect_strict(&target, self.cert_timeout_secs).await {
            Ok(record) => record,
            Err(e @ (CertError::NoCertificate | CertError::InvalidTarget(_))) => {
                return Err(e.into());
            }
            Err(e) => CertificateRecord::pending(&target, e.to_string(), Utc::now()),
        };
        self.store.upsert_certificate(&record)?;
        let contact = self
            .store
            .get_target(&target)
            .ok()
            .flatten()
            .and_then(|t| t.contact_email);
        self.maybe_alert(&record, contact.as_deref());
        Ok(record)
    }

    /// Scheduled certificate refresh for one registered target. Every
    /// failure degrades to a pending record; explicit-http targets are
    /// skipped since they carry no certificate to inspect.
    pub async fn refresh_certificate(&self, target: &Target) -> Result<()> {
        if target.url.starts_with("http://") {
            return Ok(());
        }
        let record = cert::inspect(&target.url, self.cert_timeout_secs).await;
        self.store.upsert_certificate(&record)?;
        self.maybe_alert(&record, target.contact_email.as_deref());
        Ok(())
    }

    /// Fires an expiry warning when the certificate is inside the alert
    /// window and the target has a contact. Delivery runs detached; a
    /// failed send is logged, never propagated into the check path.
    fn maybe_alert(&self, record: &CertificateRecord, contact: Option<&str>) {
        if record.is_pending() {
            return;
        }
        let Some(days) = record.days_left else { return };
        if days >= self.alert_threshold_days {
            return;
        }
        let (Some(sink), Some(recipient)) = (self.sink.as_ref(), contact) else {
            tracing::warn!(
                url = %record.url,
                days_left = days,
                "Certificate inside alert window but no sink or contact configured"
            );
            return;
        };

        let sink = sink.clone();
        let recipient = recipient.to_string();
        let record = record.clone();
        tokio::spawn(async move {
            match sink.notify_expiry(&recipient, &record).await {
                Ok(()) => {
                    tracing::info!(url = %record.url, recipient = %recipient, "Sent expiry warning")
                }
                Err(e) => {
                    tracing::error!(url = %record.url, recipient = %recipient, error = %e, "Failed to send expiry warning")
                }
            }
        });
    }

    pub fn get_certificate(&self, raw_url: &str) -> Result<Option<CertificateRecord>> {
        let url = normalize(raw_url).map_err(sitemon_storage::StorageError::from)?;
        Ok(self.store.get_certificate(&url)?)
    }

    pub fn list_certificates(&self) -> Result<Vec<CertificateRecord>> {
        Ok(self.store.list_certificates()?)
    }

    pub fn append_incident(&self, incident: NewIncident) -> Result<IncidentLogEntry> {
        Ok(self.store.append_incident(incident)?)
    }

    pub fn query_incidents(&self, query: &IncidentQuery) -> Result<Vec<IncidentLogEntry>> {
        Ok(self.store.query_incidents(query)?)
    }

    pub fn query_backup_incidents(&self) -> Result<Vec<IncidentLogEntry>> {
        Ok(self.store.query_backup_incidents()?)
    }

    pub fn delete_incident(&self, id: i64) -> Result<bool> {
        Ok(self.store.delete_incident(id)?)
    }
}
