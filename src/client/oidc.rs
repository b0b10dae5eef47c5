//! Front-channel URLs for the OIDC authorization code flow.

use url::Url;

use crate::auth::ProviderMetadata;
use crate::config::ClientConfig;
use crate::{Error, Result};

/// Public-client settings used to build login and logout URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcClientSettings {
    /// Client id registered with the identity provider
    pub client_id: String,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Where the provider sends the browser after logout
    pub post_logout_redirect_uri: Option<String>,
}

impl OidcClientSettings {
    /// Settings from the `client` config section
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            scopes: config.scopes.clone(),
            post_logout_redirect_uri: config.post_logout_redirect_uri.clone(),
        }
    }

    /// Authorization request URL (`response_type=code`, `response_mode=query`).
    ///
    /// # Errors
    ///
    /// Returns an error if the provider advertises no authorization endpoint
    /// or the endpoint is not a valid URL.
    pub fn authorization_url(
        &self,
        metadata: &ProviderMetadata,
        redirect_uri: &str,
        state: &str,
    ) -> Result<Url> {
        let endpoint = metadata.authorization_endpoint.as_deref().ok_or_else(|| {
            Error::Discovery("provider metadata has no authorization_endpoint".to_string())
        })?;
        let mut url = Url::parse(endpoint)
            .map_err(|e| Error::Discovery(format!("Invalid authorization endpoint: {e}")))?;

        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("response_mode", "query");
            params.append_pair("client_id", &self.client_id);
            params.append_pair("redirect_uri", redirect_uri);
            params.append_pair("state", state);
            if !self.scopes.is_empty() {
                params.append_pair("scope", &self.scopes.join(" "));
            }
        }

        Ok(url)
    }

    /// RP-initiated logout URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider advertises no end-session endpoint
    /// or the endpoint is not a valid URL.
    pub fn end_session_url(&self, metadata: &ProviderMetadata) -> Result<Url> {
        let endpoint = metadata.end_session_endpoint.as_deref().ok_or_else(|| {
            Error::Discovery("provider metadata has no end_session_endpoint".to_string())
        })?;
        let mut url = Url::parse(endpoint)
            .map_err(|e| Error::Discovery(format!("Invalid end session endpoint: {e}")))?;

        {
            let mut params = url.query_pairs_mut();
            params.append_pair("client_id", &self.client_id);
            if let Some(ref redirect) = self.post_logout_redirect_uri {
                params.append_pair("post_logout_redirect_uri", redirect);
            }
        }

        Ok(url)
    }
}

/// Random value for the `state` parameter
#[must_use]
pub fn new_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
