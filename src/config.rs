use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub cloudflare: CloudflareConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    /// Put `/metrics` behind the same basic credentials.
    #[serde(default = "default_true")]
    pub secured_metrics: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudflareConfig {
    pub api_token: String,
    pub zone_id: String,
    /// Static record, used for any hostname missing from `hostnames`.
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default = "default_record_type")]
    pub record_type: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    #[serde(default = "default_true")]
    pub proxied: bool,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub hostnames: BTreeMap<String, HostnameConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostnameConfig {
    pub record_id: String,
    #[serde(default)]
    pub proxied: Option<bool>,
}

fn default_record_type() -> String {
    "A".to_string()
}

fn default_ttl() -> u32 {
    300
}

fn default_true() -> bool {
    true
}

fn default_api_base() -> String {
    CLOUDFLARE_API_BASE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Seconds before the first detection.
    #[serde(default = "default_initial_delay")]
    pub initial_delay: u64,
    /// Seconds between detections.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Seconds before a discovery request is abandoned.
    #[serde(default = "default_discovery_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub public_ip_api: String,
    /// Dot-separated path into a JSON body, e.g. `data.ip`. Empty means the
    /// body is the address itself.
    #[serde(default)]
    pub response_attribute: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

fn default_initial_delay() -> u64 {
    5
}

fn default_interval() -> u64 {
    3600
}

fn default_discovery_timeout() -> u64 {
    10
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay: default_initial_delay(),
            interval: default_interval(),
            timeout: default_discovery_timeout(),
            public_ip_api: String::new(),
            response_attribute: None,
            hostname: None,
        }
    }
}

impl DetectorConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn response_attribute(&self) -> Option<&str> {
        self.response_attribute
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.auth.username.is_empty(), "auth.username must not be empty");
        ensure!(!self.auth.password.is_empty(), "auth.password must not be empty");

        let cf = &self.cloudflare;
        ensure!(!cf.api_token.is_empty(), "cloudflare.api_token must not be empty");
        ensure!(!cf.zone_id.is_empty(), "cloudflare.zone_id must not be empty");
        ensure!(!cf.record_type.is_empty(), "cloudflare.record_type must not be empty");
        ensure!(cf.ttl > 0, "cloudflare.ttl must be a positive integer");
        ensure!(
            cf.record_id.as_deref().is_some_and(|id| !id.is_empty()) || !cf.hostnames.is_empty(),
            "either cloudflare.record_id or cloudflare.hostnames must be set"
        );

        let detector = &self.detector;
        if detector.enabled {
            ensure!(
                !detector.public_ip_api.is_empty(),
                "detector.public_ip_api is required when the detector is enabled"
            );
            ensure!(detector.interval > 0, "detector.interval must be positive");
            ensure!(detector.timeout > 0, "detector.timeout must be positive");
            ensure!(
                detector.hostname.as_deref().is_some_and(|h| !h.is_empty())
                    || !cf.hostnames.is_empty(),
                "detector needs detector.hostname or cloudflare.hostnames"
            );
        }

        Ok(())
    }
}
