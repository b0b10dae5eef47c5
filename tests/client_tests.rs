//! The API client talking to a live in-process server

use std::sync::Arc;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use pretty_assertions::assert_eq;
use realm_gate::{
    api::{AppState, create_router, handlers::ProfileResponse},
    auth::Authenticator,
    client::{ApiClient, StaticSession},
    config::{Config, CorsConfig, KeycloakConfig, StaticKeyConfig},
};
use serde_json::json;
use tokio::net::TcpListener;

const SECRET: &str = "client-secret";
const ISSUER: &str = "https://sso.example.com/realms/acme";

async fn spawn_api() -> String {
    let keycloak = KeycloakConfig {
        authority: ISSUER.to_string(),
        audience: "acme-api".to_string(),
        discovery: false,
        static_keys: vec![StaticKeyConfig {
            kid: Some("local".to_string()),
            secret: Some(SECRET.to_string()),
            rsa_pem_file: None,
        }],
        ..Default::default()
    };
    let (authenticator, _) = Authenticator::from_config(&keycloak).await.unwrap();
    let app = create_router(&AppState {
        authenticator: Arc::new(authenticator),
        policies: Arc::new(Config::default().policy_set()),
        cors: CorsConfig::default(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn token(roles: &[&str]) -> String {
    let now = chrono::Utc::now().timestamp();
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("local".to_string());
    jsonwebtoken::encode(
        &header,
        &json!({
            "iss": ISSUER,
            "aud": "acme-api",
            "exp": now + 300,
            "preferred_username": "alice",
            "realm_access": {"roles": roles}
        }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn client(base: &str, token: Option<String>) -> ApiClient {
    ApiClient::new(base, Arc::new(StaticSession::new(token))).unwrap()
}

/// Test a signed-in user reads the profile
#[tokio::test]
async fn test_signed_in_user_reads_profile() {
    let base = spawn_api().await;
    let api = client(&base, Some(token(&["user"])));

    let profile: ProfileResponse = api.get("/api/user/profile").await.unwrap();
    assert_eq!(profile.username.as_deref(), Some("alice"));
    assert_eq!(profile.roles, vec!["user".to_string()]);
    assert!(profile.is_authenticated);
}

/// Test an anonymous client gets the default value and error text
#[tokio::test]
async fn test_anonymous_client_gets_default_and_error_text() {
    let base = spawn_api().await;
    let api = client(&base, None);

    assert!(api.get::<ProfileResponse>("/api/user/profile").await.is_none());
    assert!(
        api.get_raw("/api/user/profile")
            .await
            .starts_with("Error 401 Unauthorized: ")
    );
    assert!(api.test_connection().await);
}

/// Test a forbidden call reports 403
#[tokio::test]
async fn test_forbidden_call_reports_403() {
    let base = spawn_api().await;
    let api = client(&base, Some(token(&["user"])));

    let raw = api.get_raw("/api/user/admin-only").await;
    assert!(raw.starts_with("Error 403 Forbidden: "), "{raw}");

    let admin = client(&base, Some(token(&["admin"])));
    let raw = admin.get_raw("/api/user/admin-only").await;
    assert!(raw.contains("This endpoint requires admin role"), "{raw}");
}
