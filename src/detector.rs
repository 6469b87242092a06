//! Periodic public IP detection.
//!
//! After `initial_delay` the detector asks the discovery endpoint for the
//! current address, then repeats every `interval`. A changed address is pushed
//! to every target hostname; the cached value only moves once all of them
//! succeeded, so a failed cycle is retried on the next tick.

use std::sync::Arc;

use log::{debug, error, info};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{CloudflareConfig, DetectorConfig};
use crate::error::DiscoveryError;
use crate::metrics::Metrics;
use crate::provider::cloudflare::CloudflareClient;
use crate::provider::DnsRecordUpdate;
use crate::state::IpCache;
use crate::validate::validate_ip;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    hostname: String,
    record_id: Option<String>,
    proxied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectOutcome {
    DiscoveryFailed,
    Unchanged(String),
    Updated(String),
    UpdateFailed { ip: String, hostname: String },
}

pub struct IpDetector {
    client: Client,
    config: DetectorConfig,
    record_type: String,
    ttl: u32,
    targets: Vec<Target>,
    provider: Arc<CloudflareClient>,
    cache: Arc<IpCache>,
    metrics: Arc<Metrics>,
}

impl IpDetector {
    pub fn new(
        config: &DetectorConfig,
        cloudflare: &CloudflareConfig,
        provider: Arc<CloudflareClient>,
        cache: Arc<IpCache>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, DiscoveryError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            config: config.clone(),
            record_type: cloudflare.record_type.clone(),
            ttl: cloudflare.ttl,
            targets: resolve_targets(config, cloudflare),
            provider,
            cache,
            metrics,
        })
    }

    /// Runs the detection loop on its own task until `token` is cancelled.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(token).await })
    }

    async fn run(self, token: CancellationToken) {
        info!(
            "IP detector started: initial_delay={}s interval={}s hostnames={:?} api={}",
            self.config.initial_delay,
            self.config.interval,
            self.targets.iter().map(|t| &t.hostname).collect::<Vec<_>>(),
            self.config.public_ip_api
        );

        tokio::select! {
            _ = token.cancelled() => {
                info!("IP detector stopped before first detection");
                return;
            }
            _ = time::sleep(self.config.initial_delay()) => {}
        }

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.detect_and_update().await;
                }
            }
        }

        info!("IP detector stopped");
    }

    pub async fn fetch_current_ip(&self) -> Result<String, DiscoveryError> {
        let response = self.client.get(&self.config.public_ip_api).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DiscoveryError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        match self.config.response_attribute() {
            None => {
                let raw = String::from_utf8_lossy(&body).trim().to_string();
                validate_ip(&raw).map_err(|_| DiscoveryError::InvalidBody(raw.clone()))?;
                Ok(raw)
            }
            Some(attribute) => extract_ip_from_json(&body, attribute),
        }
    }

    pub async fn detect_and_update(&self) -> DetectOutcome {
        let ip = match self.fetch_current_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                error!("Failed to get current IP: {}", e);
                return DetectOutcome::DiscoveryFailed;
            }
        };

        if self.cache.is_current(&ip).await {
            info!("IP address is already up to date: {}", ip);
            return DetectOutcome::Unchanged(ip);
        }

        info!(
            "IP change detected: {} -> {}",
            self.cache.current().await.as_deref().unwrap_or("none"),
            ip
        );

        for target in &self.targets {
            let mut update =
                DnsRecordUpdate::new(&self.record_type, &target.hostname, &ip, self.ttl, target.proxied);
            if let Some(record_id) = &target.record_id {
                update = update.with_record_id(record_id.clone());
            }

            if let Err(e) = self.provider.update(&update).await {
                error!("Failed to update Cloudflare DNS for {} to {}: {}", target.hostname, ip, e);
                return DetectOutcome::UpdateFailed {
                    ip,
                    hostname: target.hostname.clone(),
                };
            }
            debug!("Updated {} to {}", target.hostname, ip);
        }

        if let Some(snapshot) = self.cache.commit(&ip).await {
            info!(
                "All records now point to {} (changed at {})",
                snapshot.ip,
                snapshot.changed_at_rfc3339()
            );
            self.metrics.record_ip_change("detector", &snapshot);
        }
        DetectOutcome::Updated(ip)
    }
}

/// `detector.hostname` selects a single host; without it every mapped
/// hostname is updated.
fn resolve_targets(config: &DetectorConfig, cloudflare: &CloudflareConfig) -> Vec<Target> {
    match config.hostname.as_deref().filter(|h| !h.is_empty()) {
        Some(hostname) => {
            let mapped = cloudflare.hostnames.get(hostname);
            vec![Target {
                hostname: hostname.to_string(),
                record_id: mapped.map(|h| h.record_id.clone()),
                proxied: mapped.and_then(|h| h.proxied).unwrap_or(cloudflare.proxied),
            }]
        }
        None => cloudflare
            .hostnames
            .iter()
            .map(|(hostname, host)| Target {
                hostname: hostname.clone(),
                record_id: Some(host.record_id.clone()),
                proxied: host.proxied.unwrap_or(cloudflare.proxied),
            })
            .collect(),
    }
}

fn extract_ip_from_json(body: &[u8], attribute: &str) -> Result<String, DiscoveryError> {
    let json: Value = serde_json::from_slice(body)?;

    let value = nested_attribute(&json, attribute)
        .filter(|v| !v.is_null())
        .ok_or_else(|| DiscoveryError::AttributeNotFound(attribute.to_string()))?;

    let ip = match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };

    if validate_ip(&ip).is_err() {
        return Err(DiscoveryError::InvalidAttribute {
            attribute: attribute.to_string(),
            value: ip,
        });
    }
    Ok(ip)
}

/// Walks a dot path such as `data.ip` through nested objects.
fn nested_attribute<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, key| current.as_object()?.get(key))
}
