//! Named authorization policies evaluated against a [`Principal`].
//!
//! # Built-in policies
//!
//! | Name | Allows when |
//! |------|-------------|
//! | `RequireAuthentication` | a token was validated |
//! | `RequireAdmin` | role set contains `admin` |
//! | `RequireUser` | role set contains `user` or `admin` |
//!
//! Additional policies are registered at startup; the set is read-only
//! afterwards and shared behind an `Arc`. Unknown policy names are denied.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::principal::Principal;

/// Policy name: authenticated principal, any roles
pub const REQUIRE_AUTHENTICATION: &str = "RequireAuthentication";
/// Policy name: `admin` role
pub const REQUIRE_ADMIN: &str = "RequireAdmin";
/// Policy name: `user` or `admin` role
pub const REQUIRE_USER: &str = "RequireUser";

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Request may proceed
    Allow,
    /// Request is refused
    Deny,
}

impl Decision {
    /// `true` for [`Decision::Allow`]
    #[must_use]
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }
}

/// One condition a principal must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// A token was validated
    Authenticated,
    /// The principal holds at least one of these roles
    AnyRole(Vec<String>),
}

impl Requirement {
    fn is_satisfied_by(&self, principal: &Principal) -> bool {
        match self {
            Self::Authenticated => principal.is_authenticated(),
            Self::AnyRole(roles) => {
                principal.is_authenticated() && roles.iter().any(|r| principal.is_in_role(r))
            }
        }
    }
}

/// A named rule; every requirement must hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy name used by routes
    pub name: String,
    /// Conditions, all of which must hold
    pub requirements: Vec<Requirement>,
}

impl Policy {
    /// Policy requiring an authenticated principal
    pub fn authenticated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirements: vec![Requirement::Authenticated],
        }
    }

    /// Policy requiring any of `roles`
    pub fn any_role<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            requirements: vec![Requirement::AnyRole(
                roles.into_iter().map(Into::into).collect(),
            )],
        }
    }

    /// Evaluate against a principal.
    ///
    /// A policy with no requirements still demands authentication.
    #[must_use]
    pub fn evaluate(&self, principal: &Principal) -> Decision {
        let allowed = principal.is_authenticated()
            && self.requirements.iter().all(|r| r.is_satisfied_by(principal));
        if allowed { Decision::Allow } else { Decision::Deny }
    }
}

/// Process-wide set of named policies.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: HashMap<String, Policy>,
}

impl PolicySet {
    /// Empty set; every lookup denies
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The three built-in policies
    #[must_use]
    pub fn builtin() -> Self {
        Self::empty()
            .with_policy(Policy::authenticated(REQUIRE_AUTHENTICATION))
            .with_policy(Policy::any_role(REQUIRE_ADMIN, ["admin"]))
            .with_policy(Policy::any_role(REQUIRE_USER, ["user", "admin"]))
    }

    /// Register a policy, replacing any previous one with the same name
    #[must_use]
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.insert(policy.name.clone(), policy);
        self
    }

    /// Look up a policy by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    /// Registered policy names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Evaluate the named policy. Unknown names deny.
    #[must_use]
    pub fn evaluate(&self, principal: &Principal, name: &str) -> Decision {
        match self.policies.get(name) {
            Some(policy) => policy.evaluate(principal),
            None => {
                warn!(policy = %name, "Unknown authorization policy, denying");
                Decision::Deny
            }
        }
    }
}
