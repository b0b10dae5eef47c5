//! HTTP router

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{MethodRouter, get},
};
use realm_claims::{PolicySet, REQUIRE_ADMIN, REQUIRE_AUTHENTICATION, REQUIRE_USER};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::handlers;
use crate::auth::{Authenticator, PolicyGuard, authenticate, authorize};
use crate::config::CorsConfig;

/// Shared application state
pub struct AppState {
    /// Token validation and claim normalization
    pub authenticator: Arc<Authenticator>,
    /// Named authorization policies
    pub policies: Arc<PolicySet>,
    /// CORS configuration
    pub cors: CorsConfig,
}

/// Create the router
pub fn create_router(state: &AppState) -> Router {
    let guarded = |route: MethodRouter, policy: &str| -> MethodRouter {
        route.route_layer(middleware::from_fn_with_state(
            PolicyGuard::new(&state.policies, policy),
            authorize,
        ))
    };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/values", get(handlers::values))
        .route(
            "/api/values/protected",
            guarded(get(handlers::values_protected), REQUIRE_AUTHENTICATION),
        )
        .route(
            "/api/values/admin-only",
            guarded(get(handlers::values_admin_only), REQUIRE_ADMIN),
        )
        .route(
            "/api/user/profile",
            guarded(get(handlers::user_profile), REQUIRE_AUTHENTICATION),
        )
        .route(
            "/api/user/admin-only",
            guarded(get(handlers::user_admin_only), REQUIRE_ADMIN),
        )
        .route(
            "/api/user/user-data",
            guarded(get(handlers::user_data), REQUIRE_USER),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.authenticator),
            authenticate,
        ))
        .layer(cors_layer(&state.cors))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// CORS layer for the configured origins.
///
/// `*` allows any origin without credentials; an explicit list allows those
/// origins with credentials and mirrors the requested method and headers.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
