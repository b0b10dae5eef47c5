//! OIDC discovery: issuer metadata and published signing keys.
//!
//! Metadata is read from `{authority}/.well-known/openid-configuration`; the
//! JWKS location comes from its `jwks_uri` unless overridden in config.

use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// Subset of the OpenID Provider Metadata document used by realm-gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderMetadata {
    /// Issuer identifier
    pub issuer: String,
    /// JWKS location
    pub jwks_uri: String,
    /// Authorization endpoint (code flow)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    /// Token endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    /// RP-initiated logout endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
}

/// Fetches provider metadata and keys.
pub struct Discovery {
    http: reqwest::Client,
    require_https: bool,
}

impl Discovery {
    /// Create a discovery client.
    ///
    /// With `require_https`, plain-HTTP URLs are refused before any request
    /// is made.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration, require_https: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .https_only(require_https)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            require_https,
        })
    }

    /// Fetch the provider metadata for `authority`.
    ///
    /// # Errors
    ///
    /// Returns an error on HTTPS policy violations, transport failures,
    /// non-success status codes or an unparseable document.
    pub async fn metadata(&self, authority: &str) -> Result<ProviderMetadata> {
        let url = metadata_url(authority);
        self.check_scheme(&url)?;
        debug!(url = %url, "Fetching OIDC provider metadata");

        let metadata: ProviderMetadata = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        self.check_scheme(&metadata.jwks_uri)?;
        Ok(metadata)
    }

    /// Fetch the JWKS document at `jwks_uri`.
    ///
    /// # Errors
    ///
    /// Returns an error on HTTPS policy violations, transport failures,
    /// non-success status codes or an unparseable document.
    pub async fn jwks(&self, jwks_uri: &str) -> Result<JwkSet> {
        self.check_scheme(jwks_uri)?;
        debug!(uri = %jwks_uri, "Fetching JWKS");

        let jwks: JwkSet = self
            .http
            .get(jwks_uri)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(keys = jwks.keys.len(), "Fetched identity provider signing keys");
        Ok(jwks)
    }

    fn check_scheme(&self, url: &str) -> Result<()> {
        if self.require_https && !url.starts_with("https://") {
            return Err(Error::Discovery(format!(
                "refusing non-HTTPS metadata URL {url} (require_https_metadata is set)"
            )));
        }
        Ok(())
    }
}

/// Well-known metadata URL for an authority.
#[must_use]
pub fn metadata_url(authority: &str) -> String {
    let base = authority.trim_end_matches('/');
    format!("{base}/.well-known/openid-configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_url_appends_well_known() {
        assert_eq!(
            metadata_url("https://sso.example.com/realms/acme"),
            "https://sso.example.com/realms/acme/.well-known/openid-configuration"
        );
    }

    #[test]
    fn metadata_url_handles_trailing_slash() {
        assert_eq!(
            metadata_url("https://sso.example.com/realms/acme/"),
            "https://sso.example.com/realms/acme/.well-known/openid-configuration"
        );
    }

    #[test]
    fn metadata_parses_keycloak_document() {
        let doc = serde_json::json!({
            "issuer": "https://sso.example.com/realms/acme",
            "authorization_endpoint": "https://sso.example.com/realms/acme/protocol/openid-connect/auth",
            "token_endpoint": "https://sso.example.com/realms/acme/protocol/openid-connect/token",
            "jwks_uri": "https://sso.example.com/realms/acme/protocol/openid-connect/certs",
            "end_session_endpoint": "https://sso.example.com/realms/acme/protocol/openid-connect/logout",
            "grant_types_supported": ["authorization_code"]
        });
        let md: ProviderMetadata = serde_json::from_value(doc).unwrap();
        assert!(md.jwks_uri.ends_with("/certs"));
        assert!(md.end_session_endpoint.is_some());
    }

    #[tokio::test]
    async fn http_authority_is_refused_when_https_required() {
        let discovery = Discovery::new(Duration::from_secs(1), true).unwrap();
        let err = discovery.metadata("http://localhost:8080/realms/dev").await.unwrap_err();
        assert!(matches!(err, Error::Discovery(_)));
    }
}
