use prometheus::{Encoder, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::state::IpSnapshot;

/// Process metrics, registered on a registry owned by the caller.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    ip_change_count: IntCounterVec,
    current_ip: IntGaugeVec,
    last_change: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests received"),
            &["path"],
        )?;
        let ip_change_count = IntCounterVec::new(
            Opts::new("ip_change_count", "Count of IP changes detected"),
            &["source"],
        )?;
        let current_ip = IntGaugeVec::new(
            Opts::new("current_ip", "Representing the current IP address"),
            &["ip"],
        )?;
        let last_change = IntGauge::new(
            "ip_last_change_timestamp_seconds",
            "Unix time of the last applied IP change",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(ip_change_count.clone()))?;
        registry.register(Box::new(current_ip.clone()))?;
        registry.register(Box::new(last_change.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            ip_change_count,
            current_ip,
            last_change,
        })
    }

    pub fn record_request(&self, path: &str) {
        self.requests_total.with_label_values(&[path]).inc();
    }

    /// `source` is either `request` or `detector`.
    pub fn record_ip_change(&self, source: &str, snapshot: &IpSnapshot) {
        self.ip_change_count.with_label_values(&[source]).inc();
        self.current_ip.reset();
        self.current_ip.with_label_values(&[snapshot.ip.as_str()]).set(1);
        self.last_change.set(snapshot.changed_at.unix_timestamp());
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
