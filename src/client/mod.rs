//! Authenticated client for the protected API.
//!
//! [`ApiClient::get`], [`ApiClient::get_raw`] and
//! [`ApiClient::test_connection`] never fail: errors are logged and turned
//! into `None`, an error string or `false`. Use [`ApiClient::try_get`] when
//! the caller needs to tell "no data" from "call failed".

pub mod oidc;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::Result;
use crate::config::ClientConfig;

pub use oidc::{OidcClientSettings, new_state};
pub use session::{AuthSession, StaticSession};

/// Public endpoint used by [`ApiClient::test_connection`]
pub const PROBE_ENDPOINT: &str = "/api/values";

/// Failure of a single API call
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network or protocol failure
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status code
    #[error("Error {status}: {body}")]
    Status {
        /// Response status
        status: StatusCode,
        /// Response body
        body: String,
    },

    /// Body was not the expected JSON
    #[error("{0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP client that attaches the session's bearer token to each call.
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<dyn AuthSession>,
}

impl ApiClient {
    /// Client for `base_url` with a 30 second request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, session: Arc<dyn AuthSession>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self::with_http_client(http, base_url, session))
    }

    /// Client from the `client` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig, session: Arc<dyn AuthSession>) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_http_client(http, config.base_url.clone(), session))
    }

    /// Client reusing an existing [`reqwest::Client`]
    pub fn with_http_client(
        http: Client,
        base_url: impl Into<String>,
        session: Arc<dyn AuthSession>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            session,
        }
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `endpoint` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport failures, non-success statuses and
    /// undecodable bodies.
    pub async fn try_get<T: DeserializeOwned>(&self, endpoint: &str) -> std::result::Result<T, ClientError> {
        let response = self.send(endpoint, true).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status { status, body });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// GET `endpoint` and decode the JSON body; `None` on any failure.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Option<T> {
        match self.try_get(endpoint).await {
            Ok(value) => Some(value),
            Err(ClientError::Status { status, .. }) => {
                warn!(
                    endpoint = %endpoint,
                    status = status.as_u16(),
                    reason = status.canonical_reason().unwrap_or(""),
                    "API call failed"
                );
                None
            }
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "Error calling API endpoint");
                None
            }
        }
    }

    /// GET `endpoint` and return the body text.
    ///
    /// Non-success responses yield `"Error {status}: {body}"` and transport
    /// failures `"Exception: {message}"`.
    pub async fn get_raw(&self, endpoint: &str) -> String {
        let result = async {
            let response = self.send(endpoint, true).await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        }
        .await;

        match result {
            Ok((status, body)) if status.is_success() => body,
            Ok((status, body)) => ClientError::Status { status, body }.to_string(),
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "Error calling API endpoint");
                format!("Exception: {e}")
            }
        }
    }

    /// Whether the public probe endpoint answers with a success status.
    ///
    /// No credentials are sent.
    pub async fn test_connection(&self) -> bool {
        match self.send(PROBE_ENDPOINT, false).await {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "API connection test");
                response.status().is_success()
            }
            Err(e) => {
                error!(error = %e, "API connection test failed");
                false
            }
        }
    }

    async fn send(&self, endpoint: &str, with_credentials: bool) -> reqwest::Result<Response> {
        let mut request = self.http.get(self.url(endpoint));

        if with_credentials {
            match self.session.access_token().await {
                Some(token) => {
                    debug!(token_prefix = %token_prefix(&token), "Attaching bearer token");
                    request = request.bearer_auth(token);
                }
                None => warn!(endpoint = %endpoint, "No access token available for API call"),
            }
        }

        request.send().await
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

/// First 20 characters of a token, for logs
fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(20).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        http::{HeaderMap, StatusCode as AxumStatus, header},
        routing::get,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    async fn echo_authorization(headers: HeaderMap) -> Json<Value> {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Json(json!({ "authorization": auth }))
    }

    async fn spawn_backend() -> String {
        let app = Router::new()
            .route("/api/values", get(|| async { Json(json!(["value1", "value2", "value3"])) }))
            .route("/echo", get(echo_authorization))
            .route("/boom", get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }))
            .route("/text", get(|| async { "not json" }));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base: &str, token: Option<&str>) -> ApiClient {
        ApiClient::new(base, Arc::new(StaticSession::new(token.map(str::to_owned)))).unwrap()
    }

    #[tokio::test]
    async fn token_is_attached_per_request() {
        let base = spawn_backend().await;

        let with: Value = client(&base, Some("abc")).get("/echo").await.unwrap();
        assert_eq!(with["authorization"], "Bearer abc");

        let without: Value = client(&base, None).get("echo").await.unwrap();
        assert_eq!(without["authorization"], Value::Null);
    }

    #[tokio::test]
    async fn failures_become_none() {
        let base = spawn_backend().await;
        let api = client(&base, Some("abc"));

        assert_eq!(api.get::<Value>("/boom").await, None);
        assert_eq!(api.get::<Value>("/text").await, None);
        assert_eq!(api.get::<Vec<String>>("/api/values").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn try_get_reports_status_and_body() {
        let base = spawn_backend().await;
        let err = client(&base, None).try_get::<Value>("/boom").await.unwrap_err();
        match err {
            ClientError::Status { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn get_raw_formats_errors() {
        let base = spawn_backend().await;
        let api = client(&base, None);

        assert_eq!(api.get_raw("/text").await, "not json");
        assert_eq!(api.get_raw("/boom").await, "Error 500 Internal Server Error: boom");
    }

    #[tokio::test]
    async fn unreachable_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = client(&format!("http://{addr}"), Some("abc"));
        assert!(!api.test_connection().await);
        assert!(api.get_raw("/api/values").await.starts_with("Exception: "));
        assert_eq!(api.get::<Value>("/api/values").await, None);
    }

    #[tokio::test]
    async fn connection_test_succeeds_against_public_endpoint() {
        let base = spawn_backend().await;
        assert!(client(&base, None).test_connection().await);
    }

    #[test]
    fn token_prefix_truncates() {
        assert_eq!(token_prefix("short"), "short...");
        assert_eq!(token_prefix(&"x".repeat(40)), format!("{}...", "x".repeat(20)));
    }
}
