use std::time::Duration;

use log::{debug, info};
use reqwest::{Client, StatusCode};

use super::{DnsRecordUpdate, ProviderResponse};
use crate::config::CloudflareConfig;
use crate::error::ProviderError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the Cloudflare `dns_records` endpoint.
///
/// Every call is a single attempt. Retrying is left to the caller.
#[derive(Debug, Clone)]
pub struct CloudflareClient {
    client: Client,
    api_base: String,
    api_token: String,
    zone_id: String,
    record_id: Option<String>,
}

impl CloudflareClient {
    pub fn new(config: &CloudflareConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            zone_id: config.zone_id.clone(),
            record_id: config.record_id.clone().filter(|id| !id.is_empty()),
        })
    }

    fn record_url(&self, record: &DnsRecordUpdate) -> Result<String, ProviderError> {
        let record_id = record
            .id
            .as_deref()
            .or(self.record_id.as_deref())
            .ok_or_else(|| ProviderError::MissingRecordId(record.name.clone()))?;

        Ok(format!(
            "{}/zones/{}/dns_records/{}",
            self.api_base, self.zone_id, record_id
        ))
    }

    pub async fn update(&self, record: &DnsRecordUpdate) -> Result<ProviderResponse, ProviderError> {
        let url = self.record_url(record)?;
        debug!("PUT {} for {} -> {}", url, record.name, record.content);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .json(record)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        let parsed: ProviderResponse = serde_json::from_slice(&body).map_err(|source| {
            ProviderError::Decode {
                status: status.as_u16(),
                source,
            }
        })?;

        if status != StatusCode::OK || !parsed.success {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                errors: parsed.errors,
            });
        }

        info!(
            "Cloudflare accepted {} record {} -> {}",
            record.record_type, record.name, record.content
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_base: String, record_id: Option<&str>) -> CloudflareConfig {
        CloudflareConfig {
            api_token: "test_token_12345".to_string(),
            zone_id: "zone-1".to_string(),
            record_id: record_id.map(str::to_string),
            record_type: "A".to_string(),
            ttl: 300,
            proxied: true,
            api_base,
            hostnames: BTreeMap::new(),
        }
    }

    fn success_body(id: &str, name: &str, content: &str) -> serde_json::Value {
        serde_json::json!({
            "success": true,
            "errors": [],
            "result": {
                "id": id,
                "type": "A",
                "name": name,
                "content": content,
                "proxied": false,
                "ttl": 120
            }
        })
    }

    #[tokio::test]
    async fn puts_record_to_static_record_endpoint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/zones/zone-1/dns_records/static-rec"))
            .and(header("Authorization", "Bearer test_token_12345"))
            .and(body_json(serde_json::json!({
                "type": "A",
                "name": "home.example.com",
                "content": "203.0.113.5",
                "ttl": 120,
                "proxied": false
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_body("static-rec", "home.example.com", "203.0.113.5")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = CloudflareClient::new(&test_config(mock_server.uri(), Some("static-rec"))).unwrap();
        let update = DnsRecordUpdate::new("A", "home.example.com", "203.0.113.5", 120, false);
        let response = client.update(&update).await.unwrap();

        let record = response.result.unwrap();
        assert_eq!(record.id, "static-rec");
        assert_eq!(record.content, "203.0.113.5");
    }

    #[tokio::test]
    async fn per_host_record_id_overrides_static_one() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/zones/zone-1/dns_records/rec-b"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_body("rec-b", "b.example.com", "203.0.113.5")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = CloudflareClient::new(&test_config(mock_server.uri(), Some("static-rec"))).unwrap();
        let update = DnsRecordUpdate::new("A", "b.example.com", "203.0.113.5", 300, true)
            .with_record_id("rec-b");

        assert!(client.update(&update).await.is_ok());
    }

    #[tokio::test]
    async fn missing_record_id_fails_without_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = CloudflareClient::new(&test_config(mock_server.uri(), None)).unwrap();
        let update = DnsRecordUpdate::new("A", "home.example.com", "203.0.113.5", 300, true);

        let err = client.update(&update).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingRecordId(ref host) if host == "home.example.com"));
    }

    #[tokio::test]
    async fn unsuccessful_body_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "errors": [{"code": 81057, "message": "Record already exists."}],
                "result": null
            })))
            .mount(&mock_server)
            .await;

        let client = CloudflareClient::new(&test_config(mock_server.uri(), Some("rec"))).unwrap();
        let update = DnsRecordUpdate::new("A", "home.example.com", "203.0.113.5", 300, true);

        let err = client.update(&update).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "cloudflare API error (status 200): 81057: Record already exists."
        );
    }

    #[tokio::test]
    async fn non_200_status_is_an_error_even_if_body_claims_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(success_body("rec", "home.example.com", "203.0.113.5")),
            )
            .mount(&mock_server)
            .await;

        let client = CloudflareClient::new(&test_config(mock_server.uri(), Some("rec"))).unwrap();
        let update = DnsRecordUpdate::new("A", "home.example.com", "203.0.113.5", 300, true);

        let err = client.update(&update).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 202, .. }));
    }

    #[tokio::test]
    async fn unparseable_body_reports_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad gateway</html>"))
            .mount(&mock_server)
            .await;

        let client = CloudflareClient::new(&test_config(mock_server.uri(), Some("rec"))).unwrap();
        let update = DnsRecordUpdate::new("A", "home.example.com", "203.0.113.5", 300, true);

        let err = client.update(&update).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode { status: 502, .. }));
    }
}
