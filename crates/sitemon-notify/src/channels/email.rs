use crate::{AlertSink, NotifyError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use sitemon_common::types::CertificateRecord;

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailChannel {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(smtp_port);

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Self {
            transport: builder.build(),
            from: from.to_string(),
        })
    }

    fn expiry_subject(cert: &CertificateRecord) -> String {
        match cert.days_left {
            Some(days) if days <= 0 => format!("[sitemon][certificate] {} has expired", cert.url),
            Some(days) => format!(
                "[sitemon][certificate] {} expires in {days} day(s)",
                cert.url
            ),
            None => format!("[sitemon][certificate] {} check pending", cert.url),
        }
    }

    fn expiry_body(cert: &CertificateRecord) -> String {
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let date = |v: &Option<chrono::DateTime<chrono::Utc>>| {
            v.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
        };
        format!(
            "Certificate expiry warning\n\n\
             URL: {url}\n\
             Subject CN: {subject}\n\
             Issuer: {issuer_cn} ({issuer_o})\n\
             Valid from: {from}\n\
             Valid until: {to}\n\
             Days remaining: {days}\n\
             Currently valid: {valid}\n\
             Checked at: {checked}",
            url = cert.url,
            subject = field(&cert.subject_cn),
            issuer_cn = field(&cert.issuer_cn),
            issuer_o = field(&cert.issuer_o),
            from = date(&cert.valid_from),
            to = date(&cert.valid_to),
            days = cert
                .days_left
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            valid = cert.currently_valid,
            checked = cert.checked_at.to_rfc3339(),
        )
    }

    async fn send_with_retry(&self, email: Message, recipient: &str) -> Result<()> {
        let mut last_err = None;
        for attempt in 0..3u32 {
            match self.transport.send(email.clone()).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        recipient = %recipient,
                        error = %e,
                        "Email send failed, retrying"
                    );
                    last_err = Some(e);
                    if attempt < 2 {
                        tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt)))
                            .await;
                    }
                }
            }
        }
        let err = last_err.map(|e| e.to_string()).unwrap_or_default();
        tracing::error!(recipient = %recipient, error = %err, "Email send failed after 3 retries");
        Err(NotifyError::Smtp(err))
    }
}

#[async_trait]
impl AlertSink for EmailChannel {
    async fn notify_expiry(&self, recipient: &str, cert: &CertificateRecord) -> Result<()> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(recipient.parse()?)
            .subject(Self::expiry_subject(cert))
            .header(ContentType::TEXT_PLAIN)
            .body(Self::expiry_body(cert))?;

        self.send_with_retry(email, recipient).await
    }

    async fn send_archive(&self, recipient: &str, filename: &str, bytes: &[u8]) -> Result<()> {
        let content_type = ContentType::parse("application/gzip")
            .map_err(|e| NotifyError::Other(format!("bad attachment content type: {e}")))?;
        let attachment = Attachment::new(filename.to_string()).body(bytes.to_vec(), content_type);

        let body = format!(
            "Monthly incident log archive.\n\nAttached: {filename} ({} bytes, gzip JSON).",
            bytes.len()
        );

        let email = Message::builder()
            .from(self.from.parse()?)
            .to(recipient.parse()?)
            .subject(format!("[sitemon][archive] {filename}"))
            .multipart(
                MultiPart::mixed()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body),
                    )
                    .singlepart(attachment),
            )?;

        self.send_with_retry(email, recipient).await
    }

    fn sink_name(&self) -> &str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn make_cert(days_left: i64) -> CertificateRecord {
        let now = Utc::now();
        CertificateRecord {
            url: "example.com".to_string(),
            subject_cn: Some("example.com".to_string()),
            issuer_cn: Some("R11".to_string()),
            issuer_o: Some("Let's Encrypt".to_string()),
            valid_from: Some(now - Duration::days(60)),
            valid_to: Some(now + Duration::days(days_left)),
            currently_valid: days_left > 0,
            days_left: Some(days_left),
            error: None,
            checked_at: now,
        }
    }

    #[test]
    fn subject_mentions_days_remaining() {
        let subject = EmailChannel::expiry_subject(&make_cert(5));
        assert!(subject.contains("example.com"));
        assert!(subject.contains("5 day(s)"));
    }

    #[test]
    fn subject_for_expired_certificate() {
        let subject = EmailChannel::expiry_subject(&make_cert(-2));
        assert!(subject.contains("has expired"));
    }

    #[test]
    fn body_carries_certificate_facts() {
        let body = EmailChannel::expiry_body(&make_cert(9));
        assert!(body.contains("URL: example.com"));
        assert!(body.contains("Issuer: R11 (Let's Encrypt)"));
        assert!(body.contains("Days remaining: 9"));
    }

    #[test]
    fn body_renders_placeholders_for_pending_record() {
        let rec = CertificateRecord::pending("down.example.com", "timed out".to_string(), Utc::now());
        let body = EmailChannel::expiry_body(&rec);
        assert!(body.contains("Subject CN: -"));
        assert!(body.contains("Days remaining: -"));
    }
}
