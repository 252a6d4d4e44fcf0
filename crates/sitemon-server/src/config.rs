use crate::probe::reach::ReachPolicy;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Live incident retention window in days. Older entries move to the
    /// backup log.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default)]
    pub reach_check: ReachCheckConfig,
    #[serde(default)]
    pub cert_check: CertCheckConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachCheckConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_reach_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_reach_timeout_secs")]
    pub timeout_secs: u64,
    /// Extended timeout for hosts on TLDs that answer slowly.
    #[serde(default = "default_slow_tld_timeout_secs")]
    pub slow_tld_timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// When true (the default), any HTTP response counts as active, even
    /// 4xx/5xx. When false, responses >= 400 are recorded as inactive.
    #[serde(default = "default_enabled")]
    pub treat_http_errors_as_active: bool,
}

impl ReachCheckConfig {
    pub fn policy(&self) -> ReachPolicy {
        ReachPolicy {
            timeout_secs: self.timeout_secs,
            slow_tld_timeout_secs: self.slow_tld_timeout_secs,
            max_redirects: self.max_redirects,
            treat_http_errors_as_active: self.treat_http_errors_as_active,
        }
    }
}

impl Default for ReachCheckConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tick_secs: default_reach_tick_secs(),
            timeout_secs: default_reach_timeout_secs(),
            slow_tld_timeout_secs: default_slow_tld_timeout_secs(),
            max_redirects: default_max_redirects(),
            max_concurrent: default_max_concurrent(),
            treat_http_errors_as_active: default_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertCheckConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cert_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_cert_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Expiry warnings fire when a certificate has fewer than this many
    /// days left.
    #[serde(default = "default_alert_threshold_days")]
    pub alert_threshold_days: i64,
}

impl Default for CertCheckConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tick_secs: default_cert_tick_secs(),
            connect_timeout_secs: default_cert_connect_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            alert_threshold_days: default_alert_threshold_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_archive_tick_secs")]
    pub tick_secs: u64,
    /// Recipient of the monthly archive mail. Required when enabled.
    #[serde(default)]
    pub recipient: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_secs: default_archive_tick_secs(),
            recipient: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub from: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{path}': {e}"))?;
        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{path}': {e}"))?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            retention_days: default_retention_days(),
            reach_check: ReachCheckConfig::default(),
            cert_check: CertCheckConfig::default(),
            archive: ArchiveConfig::default(),
            smtp: SmtpConfig::default(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_retention_days() -> u32 {
    30
}

fn default_enabled() -> bool {
    true
}

fn default_reach_tick_secs() -> u64 {
    300
}

fn default_reach_timeout_secs() -> u64 {
    30
}

fn default_slow_tld_timeout_secs() -> u64 {
    60
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_concurrent() -> usize {
    10
}

fn default_cert_tick_secs() -> u64 {
    21_600
}

fn default_cert_connect_timeout_secs() -> u64 {
    15
}

fn default_alert_threshold_days() -> i64 {
    10
}

fn default_archive_tick_secs() -> u64 {
    3_600
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.retention_days, 30);
        assert!(config.reach_check.enabled);
        assert_eq!(config.reach_check.tick_secs, 300);
        assert!(config.reach_check.treat_http_errors_as_active);
        assert_eq!(config.cert_check.alert_threshold_days, 10);
        assert!(!config.archive.enabled);
        assert!(!config.smtp.enabled);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let toml_str = r#"
            retention_days = 7

            [reach_check]
            tick_secs = 60
            treat_http_errors_as_active = false

            [archive]
            enabled = true
            recipient = "ops@example.com"
        "#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.reach_check.tick_secs, 60);
        assert!(!config.reach_check.treat_http_errors_as_active);
        assert_eq!(config.reach_check.timeout_secs, 30);
        assert!(config.archive.enabled);
        assert_eq!(config.archive.recipient.as_deref(), Some("ops@example.com"));
    }
}
