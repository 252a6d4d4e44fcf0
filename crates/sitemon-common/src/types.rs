use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of a monitored target: either an explicitly tracked asset
/// record or a URL first seen through an ad-hoc reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    TrackedAsset,
    AdHocCheck,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::TrackedAsset => write!(f, "tracked-asset"),
            TargetKind::AdHocCheck => write!(f, "ad-hoc-check"),
        }
    }
}

impl std::str::FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tracked-asset" => Ok(TargetKind::TrackedAsset),
            "ad-hoc-check" => Ok(TargetKind::AdHocCheck),
            _ => Err(format!("unknown target kind: {s}")),
        }
    }
}

/// Outcome class of a single reachability probe.
///
/// `Active` means the endpoint answered with any HTTP response, `Inactive`
/// means the transport failed (DNS, refusal, timeout), and `Error` means no
/// probe was attempted at all (e.g. a blank input URL).
///
/// # Examples
///
/// ```
/// use sitemon_common::types::ProbeStatus;
///
/// let s: ProbeStatus = "active".parse().unwrap();
/// assert_eq!(s, ProbeStatus::Active);
/// assert_eq!(s.to_string(), "active");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Active,
    Inactive,
    Error,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Active => write!(f, "active"),
            ProbeStatus::Inactive => write!(f, "inactive"),
            ProbeStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for ProbeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ProbeStatus::Active),
            "inactive" => Ok(ProbeStatus::Inactive),
            "error" => Ok(ProbeStatus::Error),
            _ => Err(format!("unknown probe status: {s}")),
        }
    }
}

/// A monitored URL with its provenance and last observed state.
///
/// Identity is the normalized URL; the registry holds at most one row per
/// normalized URL regardless of which source first observed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub url: String,
    pub kind: TargetKind,
    /// Recipient for certificate expiry notifications, when configured.
    pub contact_email: Option<String>,
    pub last_status: Option<ProbeStatus>,
    pub last_code: Option<u16>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a single reachability probe. Immutable once produced; appended
/// to the incident history, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub url: String,
    pub status: ProbeStatus,
    pub http_code: Option<u16>,
    pub message: String,
    pub observed_at: DateTime<Utc>,
}

/// Certificate facts for one URL. One live row per URL, overwritten in place
/// on every recheck.
///
/// A failed or timed-out handshake degrades to a placeholder record with
/// `error` set and the certificate fields empty, so the aggregate view stays
/// consistent even when a host is unreachable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub url: String,
    pub subject_cn: Option<String>,
    pub issuer_cn: Option<String>,
    pub issuer_o: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    /// Derived: `now < valid_to` at check time. Never set independently.
    pub currently_valid: bool,
    /// `ceil((valid_to - now) / 1 day)` at check time.
    pub days_left: Option<i64>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl CertificateRecord {
    /// Placeholder record for a host whose certificate could not be
    /// inspected (handshake error or timeout).
    pub fn pending(url: &str, error: String, checked_at: DateTime<Utc>) -> Self {
        Self {
            url: url.to_string(),
            subject_cn: None,
            issuer_cn: None,
            issuer_o: None,
            valid_from: None,
            valid_to: None,
            currently_valid: false,
            days_left: None,
            error: Some(error),
            checked_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.error.is_some()
    }
}

/// One row of the append-only incident history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentLogEntry {
    pub id: i64,
    pub url: String,
    pub status: ProbeStatus,
    pub message: String,
    pub code: Option<u16>,
    pub time: DateTime<Utc>,
}

/// Input for appending to the incident history. `time` is assigned at write
/// time when absent; the id is always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewIncident {
    pub url: String,
    pub status: ProbeStatus,
    pub message: String,
    pub code: Option<u16>,
    pub time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_status_roundtrip() {
        for s in [ProbeStatus::Active, ProbeStatus::Inactive, ProbeStatus::Error] {
            let parsed: ProbeStatus = s.to_string().parse().unwrap();
            assert_eq!(parsed, s);
        }
        assert!("bogus".parse::<ProbeStatus>().is_err());
    }

    #[test]
    fn target_kind_roundtrip() {
        for k in [TargetKind::TrackedAsset, TargetKind::AdHocCheck] {
            let parsed: TargetKind = k.to_string().parse().unwrap();
            assert_eq!(parsed, k);
        }
    }

    #[test]
    fn pending_record_has_no_certificate_fields() {
        let rec = CertificateRecord::pending("example.com", "timed out".to_string(), Utc::now());
        assert!(rec.is_pending());
        assert!(!rec.currently_valid);
        assert!(rec.valid_to.is_none());
        assert!(rec.days_left.is_none());
    }
}
