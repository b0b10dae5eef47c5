//! Claim model shared by the validator, the normalizers and the policy evaluator.
//!
//! A [`ClaimSet`] is an ordered multimap: one claim type may carry several
//! values (e.g. several `role` claims). Claims are appended, never removed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default claim type used for normalized role claims.
pub const ROLE_CLAIM: &str = "role";

/// Default claim type holding the principal's display name.
pub const PREFERRED_USERNAME_CLAIM: &str = "preferred_username";

/// A single `(type, value)` pair asserted about an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim type (e.g. `preferred_username`, `role`)
    #[serde(rename = "type")]
    pub claim_type: String,
    /// Claim value
    pub value: String,
}

impl Claim {
    /// Create a claim
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// Ordered, append-only collection of claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet {
    claims: Vec<Claim>,
}

impl ClaimSet {
    /// Create an empty claim set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a decoded JWT payload into claims.
    ///
    /// - strings become one claim
    /// - arrays become one claim per element
    /// - nested objects become one claim holding their compact JSON encoding
    /// - numbers and booleans keep their JSON text
    /// - `null` is skipped
    #[must_use]
    pub fn from_jwt_payload(payload: &Map<String, Value>) -> Self {
        let mut set = Self::new();
        for (name, value) in payload {
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(text) = scalar_text(item) {
                            set.push(Claim::new(name.as_str(), text));
                        }
                    }
                }
                other => {
                    if let Some(text) = scalar_text(other) {
                        set.push(Claim::new(name.as_str(), text));
                    }
                }
            }
        }
        set
    }

    /// Append a claim
    pub fn push(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    /// First value of the given claim type
    #[must_use]
    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// All values of the given claim type, in insertion order
    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// Check whether an exact `(type, value)` pair is present
    #[must_use]
    pub fn contains(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|c| c.claim_type == claim_type && c.value == value)
    }

    /// Iterate over all claims
    pub fn iter(&self) -> std::slice::Iter<'_, Claim> {
        self.claims.iter()
    }

    /// Number of claims
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

impl FromIterator<Claim> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self {
            claims: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ClaimSet {
    type Item = &'a Claim;
    type IntoIter = std::slice::Iter<'a, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.claims.iter()
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn flattens_arrays_into_one_claim_per_element() {
        let set = ClaimSet::from_jwt_payload(&payload(json!({
            "aud": ["api", "account"]
        })));

        let values: Vec<&str> = set.find_all("aud").collect();
        assert_eq!(values, vec!["api", "account"]);
    }

    #[test]
    fn nested_objects_become_json_strings() {
        let set = ClaimSet::from_jwt_payload(&payload(json!({
            "realm_access": {"roles": ["admin"]}
        })));

        assert_eq!(set.find_first("realm_access"), Some(r#"{"roles":["admin"]}"#));
    }

    #[test]
    fn scalars_keep_their_json_text_and_null_is_skipped() {
        let set = ClaimSet::from_jwt_payload(&payload(json!({
            "exp": 1_700_000_000,
            "email_verified": true,
            "nickname": null
        })));

        assert_eq!(set.find_first("exp"), Some("1700000000"));
        assert_eq!(set.find_first("email_verified"), Some("true"));
        assert!(set.find_first("nickname").is_none());
    }

    #[test]
    fn claim_serializes_with_type_key() {
        let json = serde_json::to_value(Claim::new("role", "admin")).unwrap();
        assert_eq!(json, json!({"type": "role", "value": "admin"}));
    }

    #[test]
    fn contains_matches_type_and_value() {
        let mut set = ClaimSet::new();
        set.push(Claim::new("role", "user"));

        assert!(set.contains("role", "user"));
        assert!(!set.contains("role", "admin"));
        assert!(!set.contains("roles", "user"));
    }
}
