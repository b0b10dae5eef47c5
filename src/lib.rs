//! realm-gate
//!
//! Keycloak / OpenID Connect bearer token authentication for an HTTP API.
//!
//! # Features
//!
//! - **Token validation**: signature, issuer, audience and lifetime with clock skew
//! - **Role normalization**: `realm_access.roles` (and optionally client roles) become role claims
//! - **Policies**: `RequireAuthentication`, `RequireAdmin`, `RequireUser`, plus configured ones
//! - **Protected API**: `/api/values` and `/api/user` endpoints with 401 / 403 semantics
//! - **Client**: bearer-forwarding API client and OIDC login/logout URL helpers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
    }
}
