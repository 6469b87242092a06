use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use log::warn;
use serde_json::json;

use crate::config::AuthConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl From<&AuthConfig> for Credentials {
    fn from(config: &AuthConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

impl Credentials {
    /// Decodes an `Authorization: Basic ...` header value.
    pub fn from_header(value: &str) -> Option<Self> {
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;

        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Middleware: lets the request through only with matching basic credentials.
pub async fn require_basic_auth(
    State(expected): State<Arc<Credentials>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(Credentials::from_header);

    match presented {
        Some(credentials) if credentials == *expected => next.run(request).await,
        Some(credentials) => {
            warn!("Rejected credentials for user {:?} on {}", credentials.username, request.uri().path());
            unauthorized()
        }
        None => {
            warn!("Missing basic credentials on {}", request.uri().path());
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"Restricted\"")],
        Json(json!({
            "success": false,
            "error": "Unauthorized",
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user_pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(user_pass))
    }

    #[test]
    fn decodes_basic_header() {
        let creds = Credentials::from_header(&basic("ddns:s3cr:et")).unwrap();
        assert_eq!(creds.username, "ddns");
        assert_eq!(creds.password, "s3cr:et");

        let lower = Credentials::from_header(&basic("ddns:secret").replace("Basic", "basic")).unwrap();
        assert_eq!(lower.username, "ddns");
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(Credentials::from_header("Bearer abc"), None);
        assert_eq!(Credentials::from_header("Basic !!!"), None);
        assert_eq!(Credentials::from_header(&basic("no-colon")), None);
        assert_eq!(Credentials::from_header("Basic"), None);
    }
}
