//! Alerting sink: delivery of certificate expiry warnings and monthly
//! archive snapshots to an operator-configured channel.
//!
//! Sinks expose a result-returning interface rather than fire-and-forget
//! callbacks; callers that do not want to wait spawn the call and log the
//! outcome. A delivery failure is never propagated back into the
//! inspection path.

pub mod channels;
pub mod error;

pub use error::{NotifyError, Result};

use async_trait::async_trait;
use sitemon_common::types::CertificateRecord;

/// A delivery channel for operator notifications.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Delivers a certificate expiry warning to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after retries (if applicable).
    async fn notify_expiry(&self, recipient: &str, cert: &CertificateRecord) -> Result<()>;

    /// Ships a compressed incident archive snapshot to `recipient`.
    async fn send_archive(&self, recipient: &str, filename: &str, bytes: &[u8]) -> Result<()>;

    /// Returns the sink type name (e.g. `"email"`).
    fn sink_name(&self) -> &str;
}
