//! Role normalization: turning provider-specific role structures into
//! standard role claims.
//!
//! Each identity provider nests roles differently. Keycloak, for example,
//! emits `realm_access: {"roles": [...]}` and
//! `resource_access: {"<client>": {"roles": [...]}}`; after JWT flattening
//! these arrive as JSON-encoded string claims. A [`RoleNormalizer`] knows one
//! such shape and extracts the plain role names; [`apply_role_normalization`]
//! appends them as role claims.
//!
//! Malformed input never fails a request: the normalizer yields no roles.

use serde_json::Value;
use tracing::debug;

use crate::claims::{Claim, ClaimSet};

/// Extracts role names from a provider-specific claim shape.
pub trait RoleNormalizer: Send + Sync {
    /// Role names found in `claims`. Empty when the shape is absent or malformed.
    fn normalize_roles(&self, claims: &ClaimSet) -> Vec<String>;
}

/// Keycloak realm roles: `realm_access` → `{"roles": [..]}`.
#[derive(Debug, Clone)]
pub struct RealmAccessRoles {
    claim: String,
}

impl RealmAccessRoles {
    /// Read roles from the given claim instead of `realm_access`
    pub fn new(claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
        }
    }
}

impl Default for RealmAccessRoles {
    fn default() -> Self {
        Self::new("realm_access")
    }
}

impl RoleNormalizer for RealmAccessRoles {
    fn normalize_roles(&self, claims: &ClaimSet) -> Vec<String> {
        let Some(raw) = claims.find_first(&self.claim) else {
            return Vec::new();
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(doc) => string_array(doc.get("roles")),
            Err(e) => {
                debug!(claim = %self.claim, error = %e, "Ignoring malformed role claim");
                Vec::new()
            }
        }
    }
}

/// Keycloak client roles: `resource_access` → `{"<client_id>": {"roles": [..]}}`.
#[derive(Debug, Clone)]
pub struct ClientAccessRoles {
    claim: String,
    client_id: String,
}

impl ClientAccessRoles {
    /// Roles assigned to `client_id` under `resource_access`
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            claim: "resource_access".to_string(),
            client_id: client_id.into(),
        }
    }

    /// Override the containing claim name
    #[must_use]
    pub fn with_claim(mut self, claim: impl Into<String>) -> Self {
        self.claim = claim.into();
        self
    }
}

impl RoleNormalizer for ClientAccessRoles {
    fn normalize_roles(&self, claims: &ClaimSet) -> Vec<String> {
        let Some(raw) = claims.find_first(&self.claim) else {
            return Vec::new();
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(doc) => string_array(doc.get(&self.client_id).and_then(|c| c.get("roles"))),
            Err(e) => {
                debug!(claim = %self.claim, error = %e, "Ignoring malformed role claim");
                Vec::new()
            }
        }
    }
}

/// Runs several normalizers in order and merges their output.
#[derive(Default)]
pub struct CompositeNormalizer {
    inner: Vec<Box<dyn RoleNormalizer>>,
}

impl CompositeNormalizer {
    /// Empty composite (yields no roles)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a normalizer
    #[must_use]
    pub fn with(mut self, normalizer: impl RoleNormalizer + 'static) -> Self {
        self.inner.push(Box::new(normalizer));
        self
    }
}

impl RoleNormalizer for CompositeNormalizer {
    fn normalize_roles(&self, claims: &ClaimSet) -> Vec<String> {
        let mut roles: Vec<String> = Vec::new();
        for normalizer in &self.inner {
            for role in normalizer.normalize_roles(claims) {
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
        }
        roles
    }
}

/// Normalizer for providers that already emit standard role claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRoleNormalization;

impl RoleNormalizer for NoRoleNormalization {
    fn normalize_roles(&self, _claims: &ClaimSet) -> Vec<String> {
        Vec::new()
    }
}

/// Append one `role_claim_type` claim per normalized role.
///
/// Roles already present as role claims are not added again.
pub fn apply_role_normalization(
    normalizer: &dyn RoleNormalizer,
    claims: &mut ClaimSet,
    role_claim_type: &str,
) {
    for role in normalizer.normalize_roles(claims) {
        if !claims.contains(role_claim_type, &role) {
            claims.push(Claim::new(role_claim_type, role));
        }
    }
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
