//! Turns an inbound update request into provider calls and shapes the reply.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{CloudflareConfig, HostnameConfig};
use crate::error::ValidationError;
use crate::metrics::Metrics;
use crate::provider::cloudflare::CloudflareClient;
use crate::provider::{DnsRecord, DnsRecordUpdate};
use crate::state::IpCache;
use crate::validate::{parse_bulk_hosts, parse_proxied, parse_ttl, validate_ip};

/// Query parameters accepted by both update endpoints.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdateParams {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default, alias = "myip")]
    pub ip: Option<String>,
    #[serde(default)]
    pub ttl: Option<String>,
    #[serde(default)]
    pub proxied: Option<String>,
    #[serde(default)]
    pub hosts: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Single,
    Bulk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostResult {
    pub hostname: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DnsRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PipelineResponse {
    Single(HostResult),
    Bulk {
        success: bool,
        results: Vec<HostResult>,
        count: usize,
    },
    Empty {
        success: bool,
        error: String,
    },
}

impl PipelineResponse {
    fn shape(mode: UpdateMode, mut results: Vec<HostResult>) -> Self {
        if mode == UpdateMode::Bulk || results.len() > 1 {
            let count = results.len();
            return PipelineResponse::Bulk {
                success: true,
                results,
                count,
            };
        }

        match results.pop() {
            Some(result) => PipelineResponse::Single(result),
            None => PipelineResponse::Empty {
                success: false,
                error: "no updates processed".to_string(),
            },
        }
    }

    /// True for a lone host update the provider rejected.
    pub fn is_single_failure(&self) -> bool {
        matches!(self, PipelineResponse::Single(result) if !result.success)
    }
}

/// Record defaults applied when the request leaves them out.
#[derive(Debug, Clone)]
pub struct RecordDefaults {
    pub record_type: String,
    pub ttl: u32,
    pub proxied: bool,
}

impl From<&CloudflareConfig> for RecordDefaults {
    fn from(config: &CloudflareConfig) -> Self {
        Self {
            record_type: config.record_type.clone(),
            ttl: config.ttl,
            proxied: config.proxied,
        }
    }
}

pub struct UpdatePipeline {
    provider: Arc<CloudflareClient>,
    defaults: RecordDefaults,
    hostnames: BTreeMap<String, HostnameConfig>,
    cache: Arc<IpCache>,
    metrics: Arc<Metrics>,
}

impl UpdatePipeline {
    pub fn new(
        provider: Arc<CloudflareClient>,
        config: &CloudflareConfig,
        cache: Arc<IpCache>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            provider,
            defaults: RecordDefaults::from(config),
            hostnames: config.hostnames.clone(),
            cache,
            metrics,
        }
    }

    pub fn handle_single(&self, params: &UpdateParams) -> Result<Vec<DnsRecordUpdate>, ValidationError> {
        let hostname = non_empty(&params.hostname);
        let ip = non_empty(&params.ip);
        let (Some(hostname), Some(ip)) = (hostname, ip) else {
            warn!(
                "Missing required parameters: hostname={:?} ip={:?}",
                params.hostname,
                params.ip
            );
            return Err(ValidationError::MissingParameters);
        };

        validate_ip(ip)?;
        let ttl = parse_ttl(params.ttl.as_deref().unwrap_or(""), self.defaults.ttl)?;
        let proxied = parse_proxied(params.proxied.as_deref().unwrap_or(""), self.defaults.proxied)?;

        Ok(vec![DnsRecordUpdate::new(
            &self.defaults.record_type,
            hostname,
            ip,
            ttl,
            proxied,
        )])
    }

    pub fn handle_bulk(&self, params: &UpdateParams) -> Result<Vec<DnsRecordUpdate>, ValidationError> {
        let Some(hosts) = non_empty(&params.hosts) else {
            warn!("Missing required parameter: hosts");
            return Err(ValidationError::MissingHosts);
        };

        let ip = params.ip.as_deref().unwrap_or("");
        validate_ip(ip)?;
        let ttl = parse_ttl(params.ttl.as_deref().unwrap_or(""), self.defaults.ttl)?;
        let proxied = parse_proxied(params.proxied.as_deref().unwrap_or(""), self.defaults.proxied)?;

        parse_bulk_hosts(hosts, ip, ttl, &self.defaults.record_type, proxied)
    }

    /// Validates `params` and expands them into record updates, with the
    /// per-hostname record ID attached where one is configured.
    pub fn prepare(
        &self,
        mode: UpdateMode,
        params: &UpdateParams,
    ) -> Result<Vec<DnsRecordUpdate>, ValidationError> {
        let updates = match mode {
            UpdateMode::Single => self.handle_single(params)?,
            UpdateMode::Bulk => self.handle_bulk(params)?,
        };

        let updates: Vec<_> = updates
            .into_iter()
            .map(|update| match self.hostnames.get(&update.name) {
                Some(host) => update.with_record_id(host.record_id.clone()),
                None => update,
            })
            .collect();

        debug!("Prepared {} DNS update(s): {:?}", updates.len(), updates);
        Ok(updates)
    }

    pub async fn process_all(&self, updates: &[DnsRecordUpdate]) -> Vec<HostResult> {
        let mut results = Vec::with_capacity(updates.len());
        for update in updates {
            results.push(self.process_one(update).await);
        }
        results
    }

    async fn process_one(&self, update: &DnsRecordUpdate) -> HostResult {
        match self.provider.update(update).await {
            Ok(response) => {
                info!("Cloudflare response for {}: {:?}", update.name, response.result);
                HostResult {
                    hostname: update.name.clone(),
                    success: true,
                    proxied: Some(update.proxied),
                    result: response.result,
                    error: None,
                }
            }
            Err(e) => {
                error!("Error updating DNS record {}: {}", update.name, e);
                HostResult {
                    hostname: update.name.clone(),
                    success: false,
                    proxied: None,
                    result: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn run(
        &self,
        mode: UpdateMode,
        params: &UpdateParams,
    ) -> Result<PipelineResponse, ValidationError> {
        let updates = self.prepare(mode, params)?;
        let results = self.process_all(&updates).await;

        if !results.is_empty() && results.iter().all(|r| r.success) {
            if let Some(ip) = updates.first().map(|u| u.content.as_str()) {
                self.commit_ip(ip).await;
            }
        }

        Ok(PipelineResponse::shape(mode, results))
    }

    async fn commit_ip(&self, ip: &str) {
        if let Some(snapshot) = self.cache.commit(ip).await {
            info!(
                "Current IP changed to {} at {}",
                snapshot.ip,
                snapshot.changed_at_rfc3339()
            );
            self.metrics.record_ip_change("request", &snapshot);
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
