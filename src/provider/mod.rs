pub mod cloudflare;

use serde::{Deserialize, Serialize};

/// One DNS record update, as sent to the provider.
///
/// `id` selects the record endpoint in multi-host setups and is not part of
/// the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecordUpdate {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
    #[serde(skip)]
    pub id: Option<String>,
}

impl DnsRecordUpdate {
    pub fn new(record_type: &str, name: &str, content: &str, ttl: u32, proxied: bool) -> Self {
        Self {
            record_type: record_type.to_string(),
            name: name.to_string(),
            content: content.to_string(),
            ttl,
            proxied,
            id: None,
        }
    }

    pub fn with_record_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Record as echoed back by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub proxied: bool,
    pub ttl: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderResponse {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiError>,
    #[serde(default)]
    pub result: Option<DnsRecord>,
}
