//! Raw TLS certificate inspection.
//!
//! Connects straight to host:port and records what the server presents.
//! Chain verification is intentionally bypassed: an expired or
//! self-signed certificate is exactly what this probe exists to report,
//! so the handshake must succeed long enough to hand us the leaf.

use chrono::{DateTime, TimeZone, Utc};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use sitemon_common::normalize::{host_and_port, InvalidTarget};
use sitemon_common::types::CertificateRecord;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error(transparent)]
    InvalidTarget(#[from] InvalidTarget),
    #[error("TCP connection failed: {0}")]
    Connect(String),
    #[error("Connection timed out after {0}s")]
    ConnectTimeout(u64),
    #[error("TLS handshake failed: {0}")]
    Handshake(String),
    #[error("TLS handshake timed out after {0}s")]
    HandshakeTimeout(u64),
    #[error("Server presented no certificate")]
    NoCertificate,
    #[error("Failed to parse X.509 certificate: {0}")]
    Parse(String),
}

/// Accepts whatever certificate the server presents. Signature checks
/// still run with the ring provider's algorithms so the handshake itself
/// stays honest.
#[derive(Debug)]
struct AcceptAnyCert(rustls::crypto::CryptoProvider);

impl AcceptAnyCert {
    fn new() -> Self {
        Self(rustls::crypto::ring::default_provider())
    }
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Derives validity flags from the expiry timestamp. `days_left` rounds
/// up, so a certificate expiring in 1 second still reads as 1 day.
pub fn evaluate_validity(
    valid_to: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (bool, Option<i64>) {
    match valid_to {
        Some(to) => {
            let secs = (to - now).num_seconds();
            let days = (secs + 86_399).div_euclid(86_400);
            (now < to, Some(days))
        }
        None => (false, None),
    }
}

/// Inspects the certificate a target presents, surfacing every failure
/// mode as a typed error. Scheduled checks degrade these to a pending
/// record via [`inspect`]; manual checks report them directly.
pub async fn inspect_strict(target: &str, timeout_secs: u64) -> Result<CertificateRecord, CertError> {
    let (host, port) = host_and_port(target)?;

    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert::new()))
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = ServerName::try_from(host.clone())
        .map_err(|e| CertError::Handshake(format!("invalid server name: {e}")))?;

    let addr = format!("{host}:{port}");
    let tcp = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        TcpStream::connect(&addr),
    )
    .await
    .map_err(|_| CertError::ConnectTimeout(timeout_secs))?
    .map_err(|e| CertError::Connect(e.to_string()))?;

    let tls_stream = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        connector.connect(server_name, tcp),
    )
    .await
    .map_err(|_| CertError::HandshakeTimeout(timeout_secs))?
    .map_err(|e| CertError::Handshake(e.to_string()))?;

    let (_io, conn) = tls_stream.into_inner();
    let certs = conn.peer_certificates().ok_or(CertError::NoCertificate)?;
    let leaf_der = certs.first().ok_or(CertError::NoCertificate)?;

    let (_, leaf) = X509Certificate::from_der(leaf_der.as_ref())
        .map_err(|e| CertError::Parse(e.to_string()))?;

    let now = Utc::now();
    let valid_from = Utc
        .timestamp_opt(leaf.validity().not_before.to_datetime().unix_timestamp(), 0)
        .single();
    let valid_to = Utc
        .timestamp_opt(leaf.validity().not_after.to_datetime().unix_timestamp(), 0)
        .single();
    let (currently_valid, days_left) = evaluate_validity(valid_to, now);

    let subject_cn = leaf
        .subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_string);
    let issuer_cn = leaf
        .issuer()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_string);
    let issuer_o = leaf
        .issuer()
        .iter_organization()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_string);

    Ok(CertificateRecord {
        url: target.to_string(),
        subject_cn,
        issuer_cn,
        issuer_o,
        valid_from,
        valid_to,
        currently_valid,
        days_left,
        error: None,
        checked_at: now,
    })
}

/// Scheduled-check variant: any failure degrades to a pending record so
/// the aggregate certificate view never loses a row to an unreachable
/// host.
pub async fn inspect(target: &str, timeout_secs: u64) -> CertificateRecord {
    match inspect_strict(target, timeout_secs).await {
        Ok(record) => record,
        Err(e) => CertificateRecord::pending(target, e.to_string(), Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_days_round_up() {
        let now = Utc::now();
        let (valid, days) = evaluate_validity(Some(now + Duration::seconds(1)), now);
        assert!(valid);
        assert_eq!(days, Some(1));

        let (valid, days) = evaluate_validity(Some(now + Duration::days(30)), now);
        assert!(valid);
        assert_eq!(days, Some(30));
    }

    #[test]
    fn expired_certificate_is_invalid_with_non_positive_days() {
        let now = Utc::now();
        let (valid, days) = evaluate_validity(Some(now - Duration::days(3)), now);
        assert!(!valid);
        assert!(days.unwrap() <= 0);
    }

    #[test]
    fn missing_expiry_is_invalid() {
        assert_eq!(evaluate_validity(None, Utc::now()), (false, None));
    }
}
