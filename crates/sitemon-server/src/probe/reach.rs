//! HTTP reachability probing.
//!
//! A probe answers one question: does the endpoint respond over HTTP at
//! all. Any HTTP response, including 4xx/5xx, means the site is up and
//! serving; transport failures (DNS, refused, timeout) mean it is not.
//! TLS verification is disabled on purpose: a broken certificate chain is
//! the certificate inspector's finding, not a reachability failure.

use chrono::Utc;
use sitemon_common::normalize::{host_and_port, request_url};
use sitemon_common::types::{CheckResult, ProbeStatus};
use std::time::Duration;

// Some sites serve bots a different response than browsers; probe as one.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone)]
pub struct ReachPolicy {
    pub timeout_secs: u64,
    pub slow_tld_timeout_secs: u64,
    pub max_redirects: usize,
    pub treat_http_errors_as_active: bool,
}

impl Default for ReachPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            slow_tld_timeout_secs: 60,
            max_redirects: 5,
            treat_http_errors_as_active: true,
        }
    }
}

/// Institutional TLDs are routinely slow to respond; give them longer
/// before declaring a timeout.
fn is_slow_tld(host: &str) -> bool {
    host.ends_with(".gov")
        || host.ends_with(".edu")
        || host.ends_with(".org")
        || host.contains(".gov.")
        || host.contains(".edu.")
}

pub fn timeout_for(policy: &ReachPolicy, target: &str) -> u64 {
    match host_and_port(target) {
        Ok((host, _)) if is_slow_tld(&host) => policy.slow_tld_timeout_secs,
        _ => policy.timeout_secs,
    }
}

/// Probes a normalized target URL once and classifies the outcome.
///
/// Never returns an error: every failure mode folds into the
/// [`CheckResult`] so one bad target cannot abort a probe cycle.
pub async fn probe(policy: &ReachPolicy, target: &str) -> CheckResult {
    let url = request_url(target);
    let timeout = timeout_for(policy, target);

    let client = match reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .redirect(reqwest::redirect::Policy::limited(policy.max_redirects))
        .timeout(Duration::from_secs(timeout))
        .user_agent(USER_AGENT)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            return CheckResult {
                url: target.to_string(),
                status: ProbeStatus::Error,
                http_code: None,
                message: format!("Probe setup failed: {e}"),
                observed_at: Utc::now(),
            };
        }
    };

    match client.get(&url).send().await {
        Ok(response) => {
            let code = response.status().as_u16();
            let is_error_code = code >= 400;
            let status = if is_error_code && !policy.treat_http_errors_as_active {
                ProbeStatus::Inactive
            } else {
                ProbeStatus::Active
            };
            CheckResult {
                url: target.to_string(),
                status,
                http_code: Some(code),
                message: format!("HTTP {code}"),
                observed_at: Utc::now(),
            }
        }
        Err(e) => CheckResult {
            url: target.to_string(),
            status: ProbeStatus::Inactive,
            http_code: None,
            message: classify_transport_error(&e),
            observed_at: Utc::now(),
        },
    }
}

/// Maps a transport failure to one of a small set of operator-facing
/// messages. Walks the error source chain; reqwest wraps the interesting
/// io error several layers deep.
pub fn classify_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return "Connection timed out".to_string();
    }

    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => return "Connection refused".to_string(),
                std::io::ErrorKind::TimedOut => return "Connection timed out".to_string(),
                _ => {}
            }
        }
        let text = e.to_string();
        if text.contains("failed to lookup address") || text.contains("dns error") {
            return "Domain not found".to_string();
        }
        source = e.source();
    }

    "Unknown error".to_string()
}
