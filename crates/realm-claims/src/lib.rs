//! realm-claims: claim model, role normalization and authorization policies.
//!
//! Pure, synchronous building blocks used by `realm-gate` after a bearer token
//! has been validated:
//!
//! - [`ClaimSet`] / [`Principal`]: the identity attached to a request
//! - [`RoleNormalizer`]: provider-specific role extraction (Keycloak
//!   `realm_access` / `resource_access`)
//! - [`PolicySet`]: named allow/deny rules, failing closed on unknown names

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod normalize;
pub mod policy;
pub mod principal;

pub use claims::{Claim, ClaimSet, PREFERRED_USERNAME_CLAIM, ROLE_CLAIM};
pub use normalize::{
    ClientAccessRoles, CompositeNormalizer, NoRoleNormalization, RealmAccessRoles,
    RoleNormalizer, apply_role_normalization,
};
pub use policy::{
    Decision, Policy, PolicySet, REQUIRE_ADMIN, REQUIRE_AUTHENTICATION, REQUIRE_USER,
    Requirement,
};
pub use principal::Principal;
