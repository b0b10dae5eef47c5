//! Axum middleware and extractors for authentication and authorization.
//!
//! [`authenticate`] runs for every request and always attaches a
//! [`Principal`] (anonymous when no valid token was presented).
//! [`authorize`] is layered on individual routes and evaluates one named
//! policy.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use realm_claims::{Decision, PolicySet, Principal};
use serde_json::json;
use tracing::{debug, warn};

use super::Authenticator;

/// Extract the token from an `Authorization: Bearer <token>` header
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
}

/// Authentication middleware
pub async fn authenticate(
    State(authenticator): State<Arc<Authenticator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let principal = match bearer_token(request.headers()) {
        Some(token) => authenticator.authenticate_now(token).unwrap_or_else(|_| {
            warn!(path = %request.uri().path(), "Invalid bearer token, continuing as anonymous");
            Principal::anonymous()
        }),
        None => Principal::anonymous(),
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Route-level guard naming the policy to evaluate.
#[derive(Clone)]
pub struct PolicyGuard {
    policies: Arc<PolicySet>,
    policy: Arc<str>,
}

impl PolicyGuard {
    /// Guard evaluating `policy` from `policies`
    pub fn new(policies: &Arc<PolicySet>, policy: &str) -> Self {
        Self {
            policies: Arc::clone(policies),
            policy: Arc::from(policy),
        }
    }
}

/// Authorization middleware.
///
/// Denied requests get 401 when no token was validated and 403 otherwise.
pub async fn authorize(
    State(guard): State<PolicyGuard>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (decision, authenticated) = match request.extensions().get::<Principal>() {
        Some(principal) => (
            guard.policies.evaluate(principal, &guard.policy),
            principal.is_authenticated(),
        ),
        None => (Decision::Deny, false),
    };

    match decision {
        Decision::Allow => {
            debug!(policy = %guard.policy, path = %request.uri().path(), "Authorized");
            next.run(request).await
        }
        Decision::Deny if !authenticated => {
            debug!(policy = %guard.policy, path = %request.uri().path(), "Unauthenticated request");
            unauthorized_response()
        }
        Decision::Deny => {
            warn!(policy = %guard.policy, path = %request.uri().path(), "Policy denied request");
            forbidden_response()
        }
    }
}

/// Extractor for the request's [`Principal`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "authentication middleware not configured"})),
                )
                    .into_response()
            })
    }
}

/// Create a 401 Unauthorized response
fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({"error": "unauthorized"})),
    )
        .into_response()
}

/// Create a 403 Forbidden response
fn forbidden_response() -> Response {
    (StatusCode::FORBIDDEN, Json(json!({"error": "forbidden"}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("BEARER abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("BeArEr  abc ")), Some("abc"));
        assert_eq!(bearer_token(&headers("Bearerabc")), None);
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
