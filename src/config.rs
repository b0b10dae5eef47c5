//! Configuration management

use std::{env, path::Path, path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use realm_claims::{PREFERRED_USERNAME_CLAIM, Policy, PolicySet, ROLE_CLAIM, Requirement};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    /// Variables are set into the process environment for `${VAR}` resolution.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Identity provider and token validation settings
    pub keycloak: KeycloakConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Additional authorization policies (on top of the built-in ones)
    pub policies: Vec<PolicyConfig>,
    /// Authenticated API client settings
    pub client: ClientConfig,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (REALM_GATE_ prefix, `__` for nesting)
        figment = figment.merge(Env::prefixed("REALM_GATE_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();
        config.expand_env_vars();

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in URL and audience values
    fn expand_env_vars(&mut self) {
        let Ok(re) = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") else {
            return;
        };

        self.keycloak.authority = Self::expand_string(&re, &self.keycloak.authority);
        self.keycloak.audience = Self::expand_string(&re, &self.keycloak.audience);
        if let Some(ref uri) = self.keycloak.jwks_uri {
            self.keycloak.jwks_uri = Some(Self::expand_string(&re, uri));
        }
        for origin in &mut self.cors.allowed_origins {
            *origin = Self::expand_string(&re, origin);
        }
        self.client.base_url = Self::expand_string(&re, &self.client.base_url);
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }

    /// Check settings that the server cannot start without.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate_for_server(&self) -> Result<()> {
        let kc = &self.keycloak;
        if kc.audience.is_empty() {
            return Err(Error::Config("keycloak.audience is required".to_string()));
        }
        if kc.discovery {
            if kc.authority.is_empty() {
                return Err(Error::Config(
                    "keycloak.authority is required when discovery is enabled".to_string(),
                ));
            }
            if kc.require_https_metadata && !kc.authority.starts_with("https://") {
                return Err(Error::Config(format!(
                    "keycloak.authority must use https when require_https_metadata is set: {}",
                    kc.authority
                )));
            }
        } else if kc.static_keys.is_empty() {
            return Err(Error::Config(
                "keycloak.static_keys must be set when discovery is disabled".to_string(),
            ));
        }
        for policy in &self.policies {
            if policy.name.is_empty() {
                return Err(Error::Config("policy name must not be empty".to_string()));
            }
        }
        Ok(())
    }

    /// Built-in policies extended with the configured ones
    #[must_use]
    pub fn policy_set(&self) -> PolicySet {
        self.policies
            .iter()
            .fold(PolicySet::builtin(), |set, p| set.with_policy(p.to_policy()))
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7002,
        }
    }
}

/// Identity provider (Keycloak realm) and token validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeycloakConfig {
    /// Realm URL, e.g. `https://sso.example.com/realms/acme`
    pub authority: String,
    /// Expected `aud` value
    pub audience: String,
    /// Expected `iss` value (defaults to the discovered issuer, then `authority`)
    pub issuer: Option<String>,
    /// Refuse non-HTTPS metadata and key endpoints
    pub require_https_metadata: bool,
    /// Tolerance applied to `exp` and `nbf`
    #[serde(with = "humantime_serde")]
    pub clock_skew: Duration,
    /// Claim holding the principal's username
    pub name_claim: String,
    /// Claim type used for normalized roles
    pub role_claim: String,
    /// Claim holding Keycloak realm roles (`None` disables realm role mapping)
    pub realm_roles_claim: Option<String>,
    /// Client ids whose `resource_access` roles are also mapped
    pub client_roles: Vec<String>,
    /// Fetch issuer metadata and JWKS from the authority
    pub discovery: bool,
    /// Override the JWKS location
    pub jwks_uri: Option<String>,
    /// Timeout for discovery requests
    #[serde(with = "humantime_serde")]
    pub metadata_timeout: Duration,
    /// Locally configured signing keys (development, tests, offline realms)
    pub static_keys: Vec<StaticKeyConfig>,
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            authority: String::new(),
            audience: String::new(),
            issuer: None,
            require_https_metadata: true,
            clock_skew: Duration::from_secs(5 * 60),
            name_claim: PREFERRED_USERNAME_CLAIM.to_string(),
            role_claim: ROLE_CLAIM.to_string(),
            realm_roles_claim: Some("realm_access".to_string()),
            client_roles: Vec::new(),
            discovery: true,
            jwks_uri: None,
            metadata_timeout: Duration::from_secs(10),
            static_keys: Vec::new(),
        }
    }
}

impl KeycloakConfig {
    /// Expected issuer, given the issuer advertised by discovery (if any)
    #[must_use]
    pub fn expected_issuer(&self, discovered: Option<&str>) -> String {
        self.issuer
            .clone()
            .or_else(|| discovered.map(str::to_owned))
            .unwrap_or_else(|| self.authority.trim_end_matches('/').to_string())
    }
}

/// A signing key supplied through configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticKeyConfig {
    /// Key id matched against the token's `kid` header
    #[serde(default)]
    pub kid: Option<String>,
    /// HMAC secret (supports `env:VAR_NAME`)
    #[serde(default)]
    pub secret: Option<String>,
    /// Path to a PEM-encoded RSA public key
    #[serde(default)]
    pub rsa_pem_file: Option<PathBuf>,
}

impl StaticKeyConfig {
    /// Resolve the secret (expand `env:VAR_NAME`)
    #[must_use]
    pub fn resolve_secret(&self) -> Option<String> {
        self.secret.as_ref().map(|secret| {
            if let Some(var_name) = secret.strip_prefix("env:") {
                env::var(var_name).unwrap_or_else(|_| secret.clone())
            } else {
                secret.clone()
            }
        })
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins (`["*"]` = any origin, credentials disabled)
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// A named policy defined in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Policy name referenced by routes
    pub name: String,
    /// Any of these roles satisfies the policy (empty = authentication only)
    #[serde(default)]
    pub roles: Vec<String>,
}

impl PolicyConfig {
    /// Convert into a [`Policy`]
    #[must_use]
    pub fn to_policy(&self) -> Policy {
        let requirement = if self.roles.is_empty() {
            Requirement::Authenticated
        } else {
            Requirement::AnyRole(self.roles.clone())
        };
        Policy {
            name: self.name.clone(),
            requirements: vec![requirement],
        }
    }
}

/// Settings for the authenticated API client and the OIDC login flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the protected API
    pub base_url: String,
    /// OIDC public client id
    pub client_id: String,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Redirect URI registered for the authorization code flow
    pub redirect_uri: Option<String>,
    /// Where the provider sends the browser after logout
    pub post_logout_redirect_uri: Option<String>,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Access token for CLI calls (supports `env:VAR_NAME`)
    pub access_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:7002".to_string(),
            client_id: String::new(),
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
            redirect_uri: None,
            post_logout_redirect_uri: None,
            timeout: Duration::from_secs(30),
            access_token: None,
        }
    }
}

impl ClientConfig {
    /// Resolve the access token (expand `env:VAR_NAME`; unset variables yield `None`)
    #[must_use]
    pub fn resolve_access_token(&self) -> Option<String> {
        let token = self.access_token.as_ref()?;
        match token.strip_prefix("env:") {
            Some(var_name) => env::var(var_name).ok().filter(|t| !t.is_empty()),
            None => Some(token.clone()).filter(|t| !t.is_empty()),
        }
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else {
            // Assume seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
