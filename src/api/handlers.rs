//! Route handlers for `/api/values` and `/api/user`.

use axum::Json;
use realm_claims::Claim;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::auth::CurrentUser;

/// Body of `GET /api/user/profile`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    /// Username from the configured name claim
    pub username: Option<String>,
    /// Every claim on the principal
    pub claims: Vec<Claim>,
    /// Normalized roles
    pub roles: Vec<String>,
    /// Whether a token was validated
    pub is_authenticated: bool,
}

/// Body of the message endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Fixed message describing the endpoint
    pub message: String,
    /// Username of the caller
    pub user: Option<String>,
}

impl MessageResponse {
    fn new(message: &str, user: &CurrentUser) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
            user: user.0.name().map(str::to_owned),
        })
    }
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `GET /api/values` (public)
pub async fn values() -> Json<[&'static str; 3]> {
    Json(["value1", "value2", "value3"])
}

/// `GET /api/values/protected`
pub async fn values_protected(user: CurrentUser) -> Json<MessageResponse> {
    MessageResponse::new("This is protected data", &user)
}

/// `GET /api/values/admin-only`
pub async fn values_admin_only(user: CurrentUser) -> Json<MessageResponse> {
    MessageResponse::new("Admin only data", &user)
}

/// `GET /api/user/profile`
pub async fn user_profile(CurrentUser(principal): CurrentUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        username: principal.name().map(str::to_owned),
        claims: principal.claims().iter().cloned().collect(),
        roles: principal.roles().map(str::to_owned).collect(),
        is_authenticated: principal.is_authenticated(),
    })
}

/// `GET /api/user/admin-only`
pub async fn user_admin_only(user: CurrentUser) -> Json<MessageResponse> {
    MessageResponse::new("This endpoint requires admin role", &user)
}

/// `GET /api/user/user-data`
pub async fn user_data(user: CurrentUser) -> Json<MessageResponse> {
    MessageResponse::new("This endpoint requires user or admin role", &user)
}
