//! Protected resource API server.
//!
//! # Endpoints
//!
//! | Method | Path | Policy |
//! |--------|------|--------|
//! | `GET` | `/health` | public |
//! | `GET` | `/api/values` | public |
//! | `GET` | `/api/values/protected` | `RequireAuthentication` |
//! | `GET` | `/api/values/admin-only` | `RequireAdmin` |
//! | `GET` | `/api/user/profile` | `RequireAuthentication` |
//! | `GET` | `/api/user/admin-only` | `RequireAdmin` |
//! | `GET` | `/api/user/user-data` | `RequireUser` |

pub mod handlers;
pub mod router;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::{Error, Result};

pub use router::{AppState, create_router};

/// API server
pub struct ApiServer {
    config: Config,
    state: AppState,
}

impl ApiServer {
    /// Create the server: validate configuration, load signing keys and
    /// build the policy set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or the identity
    /// provider cannot be reached.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate_for_server()?;

        let (authenticator, _metadata) = Authenticator::from_config(&config.keycloak).await?;
        let policies = config.policy_set();
        info!(policies = ?policies.names(), "Authorization policies loaded");

        let state = AppState {
            authenticator: Arc::new(authenticator),
            policies: Arc::new(policies),
            cors: config.cors.clone(),
        };

        Ok(Self { config, state })
    }

    /// Run until Ctrl-C / SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, binding fails or the
    /// server terminates abnormally.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let app = create_router(&self.state);
        let listener = TcpListener::bind(addr).await?;

        info!(
            host = %self.config.server.host,
            port = self.config.server.port,
            authority = %self.config.keycloak.authority,
            audience = %self.config.keycloak.audience,
            "Listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
