//! Sources of the caller's identity and access token.

use async_trait::async_trait;
use realm_claims::Principal;

/// The signed-in user's session as seen by [`ApiClient`](super::ApiClient).
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Current access token, if the user is signed in
    async fn access_token(&self) -> Option<String>;

    /// Current user, if known
    async fn current_user(&self) -> Option<Principal>;

    /// Whether the current user holds `role`
    async fn is_in_role(&self, role: &str) -> bool {
        self.current_user()
            .await
            .is_some_and(|user| user.is_in_role(role))
    }
}

/// A session with a fixed token, e.g. one passed on the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    token: Option<String>,
    user: Option<Principal>,
}

impl StaticSession {
    /// Session carrying `token` (empty tokens count as signed out)
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            user: None,
        }
    }

    /// Signed-out session
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Attach the user the token was issued to
    #[must_use]
    pub fn with_user(mut self, user: Principal) -> Self {
        self.user = Some(user);
        self
    }
}

#[async_trait]
impl AuthSession for StaticSession {
    async fn access_token(&self) -> Option<String> {
        self.token.clone()
    }

    async fn current_user(&self) -> Option<Principal> {
        self.user.clone()
    }
}
