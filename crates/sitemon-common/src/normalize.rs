//! Canonical URL normalization.
//!
//! Every component that stores, compares, or deduplicates target URLs must
//! go through [`normalize`]; comparing raw inputs breaks dedup silently.
//! The canonical form lower-cases the host, strips a leading `www.`, drops
//! the trailing slash, and omits the implied `https://` marker (an explicit
//! `http://` is kept, since it changes what the probe does).

use url::Url;

/// The input could not be parsed as a monitorable http(s) URL.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid target URL '{0}'")]
pub struct InvalidTarget(pub String);

fn parse(raw: &str) -> Result<Url, InvalidTarget> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidTarget(raw.to_string()));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = Url::parse(&candidate).map_err(|_| InvalidTarget(raw.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(InvalidTarget(raw.to_string()));
    }
    if parsed.host_str().is_none() {
        return Err(InvalidTarget(raw.to_string()));
    }
    Ok(parsed)
}

/// Normalizes a raw URL into its canonical identity form.
///
/// # Examples
///
/// ```
/// use sitemon_common::normalize::normalize;
///
/// assert_eq!(normalize("example.com").unwrap(), "example.com");
/// assert_eq!(normalize("https://WWW.Example.com/").unwrap(), "example.com");
/// assert_eq!(normalize("http://example.com/a/").unwrap(), "http://example.com/a");
/// assert!(normalize("not a url").is_err());
/// ```
pub fn normalize(raw: &str) -> Result<String, InvalidTarget> {
    let parsed = parse(raw)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| InvalidTarget(raw.to_string()))?
        .to_ascii_lowercase();
    let host = match host.strip_prefix("www.") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => host,
    };

    let mut out = String::new();
    if parsed.scheme() == "http" {
        out.push_str("http://");
    }
    out.push_str(&host);
    if let Some(port) = parsed.port() {
        out.push_str(&format!(":{port}"));
    }
    out.push_str(parsed.path().trim_end_matches('/'));
    if let Some(query) = parsed.query() {
        out.push('?');
        out.push_str(query);
    }
    Ok(out)
}

/// Expands a normalized target back into a URL the HTTP prober can request.
/// The implied-https canonical form gets its scheme restored.
pub fn request_url(target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("https://{target}")
    }
}

/// Extracts the host and TLS port (explicit port, else 443) for a raw
/// certificate inspection connection.
pub fn host_and_port(target: &str) -> Result<(String, u16), InvalidTarget> {
    let parsed = parse(target)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| InvalidTarget(target.to_string()))?
        .to_ascii_lowercase();
    Ok((host, parsed.port().unwrap_or(443)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_www_and_slash_variants_collapse() {
        let variants = [
            "example.com",
            "example.com/",
            "https://example.com",
            "https://example.com/",
            "https://www.example.com",
            "https://www.example.com/",
            "WWW.EXAMPLE.COM",
        ];
        for v in variants {
            assert_eq!(normalize(v).unwrap(), "example.com", "input: {v}");
        }
    }

    #[test]
    fn explicit_http_scheme_is_preserved() {
        assert_eq!(normalize("http://example.com/").unwrap(), "http://example.com");
        assert_ne!(
            normalize("http://example.com").unwrap(),
            normalize("https://example.com").unwrap()
        );
    }

    #[test]
    fn port_path_and_query_survive() {
        assert_eq!(
            normalize("https://Example.com:8443/Status/?x=1").unwrap(),
            "example.com:8443/Status?x=1"
        );
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        for bad in ["", "   ", "ftp://example.com", "http://", "://nope"] {
            assert!(normalize(bad).is_err(), "input: {bad}");
        }
    }

    #[test]
    fn request_url_restores_https() {
        assert_eq!(request_url("example.com"), "https://example.com");
        assert_eq!(request_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn host_and_port_defaults_to_443() {
        assert_eq!(
            host_and_port("example.com").unwrap(),
            ("example.com".to_string(), 443)
        );
        assert_eq!(
            host_and_port("https://example.com:8443").unwrap(),
            ("example.com".to_string(), 8443)
        );
    }
}
