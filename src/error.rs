use thiserror::Error;

use crate::provider::ApiError;

/// Rejected request parameters. Always answered with `400 Bad Request`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required parameters: hostname and ip")]
    MissingParameters,

    #[error("missing required parameter: hosts")]
    MissingHosts,

    #[error("invalid IP address format")]
    InvalidIp,

    #[error("invalid ttl parameter, must be a positive integer")]
    InvalidTtl,

    #[error("invalid proxied parameter, must be 'true' or 'false'")]
    InvalidProxied,

    #[error("empty hostname in entry: {0}")]
    EmptyHostname(String),

    #[error("no valid hosts provided")]
    NoValidHosts,
}

/// Failure of a single Cloudflare record update.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no record id configured for host {0}")]
    MissingRecordId(String),

    #[error("error making HTTP request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("error decoding response (status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("cloudflare API error (status {status}): {}", format_api_errors(.errors))]
    Api { status: u16, errors: Vec<ApiError> },
}

/// Failure to learn the current public IP from the discovery endpoint.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to call IP API: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IP API returned non-200 status: {0}")]
    Status(u16),

    #[error("API returned invalid IP address: {0}")]
    InvalidBody(String),

    #[error("failed to parse API response as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("attribute '{0}' not found in API response")]
    AttributeNotFound(String),

    #[error("attribute '{attribute}' does not contain a valid IP address: {value}")]
    InvalidAttribute { attribute: String, value: String },
}

fn format_api_errors(errors: &[ApiError]) -> String {
    if errors.is_empty() {
        return "[]".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}
