//! The validated identity attached to one request.

use serde::Serialize;

use crate::claims::{ClaimSet, ROLE_CLAIM};

/// Identity and claims for a single request.
///
/// Built once by the authenticator and read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    name: Option<String>,
    authenticated: bool,
    claims: ClaimSet,
    #[serde(skip)]
    role_claim_type: String,
}

impl Principal {
    /// Principal for a request that presented no valid token.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            name: None,
            authenticated: false,
            claims: ClaimSet::new(),
            role_claim_type: ROLE_CLAIM.to_string(),
        }
    }

    /// Authenticated principal.
    ///
    /// The name is read from `name_claim`; roles are the values of
    /// `role_claim_type` claims.
    #[must_use]
    pub fn authenticated(claims: ClaimSet, name_claim: &str, role_claim_type: &str) -> Self {
        Self {
            name: claims.find_first(name_claim).map(str::to_owned),
            authenticated: true,
            claims,
            role_claim_type: role_claim_type.to_owned(),
        }
    }

    /// Username, when the configured name claim was present
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether a token was validated for this request
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Full claim set, including normalized roles
    #[must_use]
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// Role names in insertion order
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.claims.find_all(&self.role_claim_type)
    }

    /// Check role membership
    #[must_use]
    pub fn is_in_role(&self, role: &str) -> bool {
        self.claims.contains(&self.role_claim_type, role)
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::anonymous()
    }
}
