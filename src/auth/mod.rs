//! Bearer token authentication and claims-based authorization.
//!
//! # Request flow
//!
//! ```text
//! Authorization: Bearer <jwt>
//!   -> TokenValidator      signature / iss / aud / exp (+ skew)
//!   -> RoleNormalizer      realm_access.roles -> role claims
//!   -> Principal           inserted into request extensions
//!   -> PolicySet           per-route allow / deny (401 or 403)
//!   -> handler
//! ```
//!
//! Keys, validation parameters and policies are built once at startup and
//! shared immutably; nothing here mutates shared state per request.

pub mod discovery;
pub mod keys;
pub mod middleware;
pub mod validator;

use std::sync::Arc;

use realm_claims::{
    ClientAccessRoles, CompositeNormalizer, Principal, RealmAccessRoles, RoleNormalizer,
    apply_role_normalization,
};
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::KeycloakConfig;

pub use discovery::{Discovery, ProviderMetadata};
pub use keys::KeyMaterial;
pub use middleware::{CurrentUser, PolicyGuard, authenticate, authorize};
pub use validator::{TokenRejection, TokenValidator, ValidationParameters};

/// The single outcome reported for any token validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unauthenticated")]
pub struct Unauthenticated;

/// Validates a token and turns its claims into a [`Principal`].
pub struct Authenticator {
    validator: TokenValidator,
    normalizer: Arc<dyn RoleNormalizer>,
    name_claim: String,
    role_claim: String,
}

impl Authenticator {
    /// Create an authenticator
    pub fn new(
        validator: TokenValidator,
        normalizer: Arc<dyn RoleNormalizer>,
        name_claim: impl Into<String>,
        role_claim: impl Into<String>,
    ) -> Self {
        Self {
            validator,
            normalizer,
            name_claim: name_claim.into(),
            role_claim: role_claim.into(),
        }
    }

    /// Build from configuration, running OIDC discovery when enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails, configured keys cannot be loaded,
    /// or no signing keys are available at all.
    pub async fn from_config(config: &KeycloakConfig) -> Result<(Self, Option<ProviderMetadata>)> {
        let mut keys = KeyMaterial::from_static(&config.static_keys)?;
        let mut metadata = None;

        if config.discovery {
            let discovery = Discovery::new(config.metadata_timeout, config.require_https_metadata)?;
            let md = discovery.metadata(&config.authority).await?;
            let jwks_uri = config.jwks_uri.clone().unwrap_or_else(|| md.jwks_uri.clone());
            let jwks = discovery.jwks(&jwks_uri).await?;
            keys = keys.merge(KeyMaterial::from_jwks(&jwks));
            metadata = Some(md);
        }

        if keys.is_empty() {
            return Err(crate::Error::Discovery(
                "no usable signing keys were loaded".to_string(),
            ));
        }

        let issuer = config.expected_issuer(metadata.as_ref().map(|m| m.issuer.as_str()));
        info!(issuer = %issuer, audience = %config.audience, keys = keys.len(), "Token validation configured");

        let params = ValidationParameters::new(issuer, config.audience.clone())
            .with_clock_skew(config.clock_skew);
        let validator = TokenValidator::new(params, Arc::new(keys));

        Ok((
            Self::new(
                validator,
                normalizer_from_config(config),
                config.name_claim.clone(),
                config.role_claim.clone(),
            ),
            metadata,
        ))
    }

    /// Authenticate `token` at time `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns [`Unauthenticated`] for any validation failure; the specific
    /// reason is only logged.
    pub fn authenticate(&self, token: &str, now: i64) -> std::result::Result<Principal, Unauthenticated> {
        let mut claims = self.validator.validate(token, now).map_err(|reason| {
            warn!(reason = %reason, "Bearer token rejected");
            Unauthenticated
        })?;

        apply_role_normalization(self.normalizer.as_ref(), &mut claims, &self.role_claim);
        let principal = Principal::authenticated(claims, &self.name_claim, &self.role_claim);
        debug!(
            user = principal.name().unwrap_or("<unnamed>"),
            roles = ?principal.roles().collect::<Vec<_>>(),
            "Bearer token validated"
        );
        Ok(principal)
    }

    /// Authenticate against the current wall clock
    ///
    /// # Errors
    ///
    /// See [`Authenticator::authenticate`].
    pub fn authenticate_now(&self, token: &str) -> std::result::Result<Principal, Unauthenticated> {
        self.authenticate(token, chrono::Utc::now().timestamp())
    }
}

/// Role normalizer for the configured realm and client role claims.
#[must_use]
pub fn normalizer_from_config(config: &KeycloakConfig) -> Arc<dyn RoleNormalizer> {
    let mut composite = CompositeNormalizer::new();
    if let Some(ref claim) = config.realm_roles_claim {
        composite = composite.with(RealmAccessRoles::new(claim.clone()));
    }
    for client_id in &config.client_roles {
        composite = composite.with(ClientAccessRoles::new(client_id.clone()));
    }
    Arc::new(composite)
}
