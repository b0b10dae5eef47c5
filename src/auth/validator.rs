//! Bearer token validation: signature, issuer, audience and lifetime.
//!
//! # Validation order
//!
//! 1. Decode the JWT header to get `alg` and `kid`.
//! 2. Select a key from the startup [`KeyMaterial`].
//! 3. Verify the signature (`jsonwebtoken`, time checks disabled).
//! 4. Compare `iss` with the expected issuer.
//! 5. Require one of the expected audiences in `aud`.
//! 6. Check `nbf - skew <= now <= exp + skew` against the supplied clock.
//!
//! Every failure is a typed [`TokenRejection`]; callers outside this module
//! only see "unauthenticated".

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Validation, errors::ErrorKind};
use realm_claims::ClaimSet;
use serde_json::{Map, Value};

use super::keys::KeyMaterial;

/// Why a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    /// Not a structurally valid JWT
    #[error("malformed token")]
    Malformed,
    /// No loaded key matches the token's `kid` and `alg`
    #[error("no signing key matches the token header")]
    UnknownKey,
    /// Signature does not verify
    #[error("invalid signature")]
    InvalidSignature,
    /// `iss` differs from the expected issuer
    #[error("issuer mismatch")]
    IssuerMismatch,
    /// `aud` contains none of the expected audiences
    #[error("audience mismatch")]
    AudienceMismatch,
    /// `exp` plus skew is in the past
    #[error("token expired")]
    Expired,
    /// `nbf` minus skew is in the future
    #[error("token not yet valid")]
    NotYetValid,
}

/// Expected issuer, audiences and clock tolerance.
#[derive(Debug, Clone)]
pub struct ValidationParameters {
    /// Exact `iss` value
    pub issuer: String,
    /// Accepted `aud` values (any one suffices)
    pub audiences: Vec<String>,
    /// Tolerance applied to `exp` and `nbf`
    pub clock_skew: Duration,
}

impl ValidationParameters {
    /// Parameters with the default five-minute clock skew
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audiences: vec![audience.into()],
            clock_skew: Duration::from_secs(5 * 60),
        }
    }

    /// Override the clock skew
    #[must_use]
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }
}

/// Verifies bearer tokens against immutable key material.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    params: ValidationParameters,
    keys: Arc<KeyMaterial>,
}

impl TokenValidator {
    /// Create a validator
    #[must_use]
    pub fn new(params: ValidationParameters, keys: Arc<KeyMaterial>) -> Self {
        Self { params, keys }
    }

    /// Validation parameters in use
    #[must_use]
    pub fn params(&self) -> &ValidationParameters {
        &self.params
    }

    /// Validate `token` at time `now` (Unix seconds) and return its claims.
    ///
    /// # Errors
    ///
    /// Returns the first [`TokenRejection`] encountered.
    pub fn validate(&self, token: &str, now: i64) -> Result<ClaimSet, TokenRejection> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| TokenRejection::Malformed)?;
        let key = self
            .keys
            .select(header.kid.as_deref(), header.alg)
            .ok_or(TokenRejection::UnknownKey)?;

        // Lifetime and audience are checked below against the caller's clock.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let payload = jsonwebtoken::decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidKeyFormat => TokenRejection::InvalidSignature,
                _ => TokenRejection::Malformed,
            })?
            .claims;

        if payload.get("iss").and_then(Value::as_str) != Some(self.params.issuer.as_str()) {
            return Err(TokenRejection::IssuerMismatch);
        }

        check_audience(payload.get("aud"), &self.params.audiences)?;
        check_lifetime(&payload, now, self.params.clock_skew)?;

        Ok(ClaimSet::from_jwt_payload(&payload))
    }
}

/// Accept a string or array `aud` containing one of `expected`.
fn check_audience(aud: Option<&Value>, expected: &[String]) -> Result<(), TokenRejection> {
    let matches = match aud {
        Some(Value::String(s)) => expected.iter().any(|e| e == s),
        Some(Value::Array(arr)) => arr
            .iter()
            .any(|v| v.as_str().is_some_and(|s| expected.iter().any(|e| e == s))),
        _ => false,
    };

    if matches {
        Ok(())
    } else {
        Err(TokenRejection::AudienceMismatch)
    }
}

fn check_lifetime(
    payload: &Map<String, Value>,
    now: i64,
    skew: Duration,
) -> Result<(), TokenRejection> {
    let skew = i64::try_from(skew.as_secs()).unwrap_or(i64::MAX);
    let exp = numeric_date(payload.get("exp")).ok_or(TokenRejection::Malformed)?;
    if now > exp.saturating_add(skew) {
        return Err(TokenRejection::Expired);
    }
    if let Some(nbf) = numeric_date(payload.get("nbf")) {
        if now < nbf.saturating_sub(skew) {
            return Err(TokenRejection::NotYetValid);
        }
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn numeric_date(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.floor() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"realm-gate-test-secret";
    const ISSUER: &str = "https://sso.example.com/realms/acme";
    const AUDIENCE: &str = "acme-api";
    const NOW: i64 = 1_700_000_000;

    fn validator() -> TokenValidator {
        TokenValidator::new(
            ValidationParameters::new(ISSUER, AUDIENCE),
            Arc::new(KeyMaterial::hmac(Some("k1"), SECRET)),
        )
    }

    fn sign_with(secret: &[u8], claims: &Value) -> String {
        let header = Header {
            kid: Some("k1".to_string()),
            ..Header::new(Algorithm::HS256)
        };
        jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn sign(claims: &Value) -> String {
        sign_with(SECRET, claims)
    }

    fn claims(exp: i64) -> Value {
        json!({
            "iss": ISSUER,
            "aud": AUDIENCE,
            "exp": exp,
            "preferred_username": "alice",
            "realm_access": {"roles": ["user"]}
        })
    }

    #[test]
    fn valid_token_yields_flattened_claims() {
        let set = validator().validate(&sign(&claims(NOW + 60)), NOW).unwrap();
        assert_eq!(set.find_first("preferred_username"), Some("alice"));
        assert_eq!(set.find_first("realm_access"), Some(r#"{"roles":["user"]}"#));
    }

    #[test]
    fn expiry_within_skew_is_accepted() {
        let token = sign(&claims(NOW - 299));
        assert!(validator().validate(&token, NOW).is_ok());
    }

    #[test]
    fn expiry_beyond_skew_is_rejected() {
        let token = sign(&claims(NOW - 301));
        assert_eq!(validator().validate(&token, NOW), Err(TokenRejection::Expired));
    }

    #[test]
    fn zero_skew_rejects_immediately_after_expiry() {
        let v = TokenValidator::new(
            ValidationParameters::new(ISSUER, AUDIENCE).with_clock_skew(Duration::ZERO),
            Arc::new(KeyMaterial::hmac(Some("k1"), SECRET)),
        );
        assert!(v.validate(&sign(&claims(NOW)), NOW).is_ok());
        assert_eq!(v.validate(&sign(&claims(NOW - 1)), NOW), Err(TokenRejection::Expired));
    }

    #[test]
    fn expired_token_with_bad_signature_is_still_rejected() {
        let token = sign_with(b"someone-else", &claims(NOW - 3600));
        assert!(validator().validate(&token, NOW).is_err());
    }

    #[test]
    fn not_before_respects_skew() {
        let mut c = claims(NOW + 3600);
        c["nbf"] = json!(NOW + 200);
        assert!(validator().validate(&sign(&c), NOW).is_ok());

        c["nbf"] = json!(NOW + 400);
        assert_eq!(validator().validate(&sign(&c), NOW), Err(TokenRejection::NotYetValid));
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let token = sign_with(b"someone-else", &claims(NOW + 60));
        assert_eq!(validator().validate(&token, NOW), Err(TokenRejection::InvalidSignature));
    }

    #[test]
    fn issuer_must_match_exactly() {
        let mut c = claims(NOW + 60);
        c["iss"] = json!("https://sso.example.com/realms/other");
        assert_eq!(validator().validate(&sign(&c), NOW), Err(TokenRejection::IssuerMismatch));
    }

    #[test]
    fn audience_array_membership_is_enough() {
        let mut c = claims(NOW + 60);
        c["aud"] = json!(["account", AUDIENCE]);
        assert!(validator().validate(&sign(&c), NOW).is_ok());

        c["aud"] = json!(["account"]);
        assert_eq!(validator().validate(&sign(&c), NOW), Err(TokenRejection::AudienceMismatch));
    }

    #[test]
    fn missing_audience_is_rejected() {
        let mut c = claims(NOW + 60);
        c.as_object_mut().unwrap().remove("aud");
        assert_eq!(validator().validate(&sign(&c), NOW), Err(TokenRejection::AudienceMismatch));
    }

    #[test]
    fn missing_exp_is_malformed() {
        let mut c = claims(NOW + 60);
        c.as_object_mut().unwrap().remove("exp");
        assert_eq!(validator().validate(&sign(&c), NOW), Err(TokenRejection::Malformed));
    }

    #[test]
    fn unknown_kid_is_rejected() {
        let header = Header {
            kid: Some("rotated".to_string()),
            ..Header::new(Algorithm::HS256)
        };
        let token =
            jsonwebtoken::encode(&header, &claims(NOW + 60), &EncodingKey::from_secret(SECRET))
                .unwrap();
        assert_eq!(validator().validate(&token, NOW), Err(TokenRejection::UnknownKey));
    }

    #[test]
    fn token_kid_is_accepted_by_unnamed_key() {
        let v = TokenValidator::new(
            ValidationParameters::new(ISSUER, AUDIENCE),
            Arc::new(KeyMaterial::hmac(None, SECRET)),
        );
        assert!(v.validate(&sign(&claims(NOW + 60)), NOW).is_ok());
        assert_eq!(
            v.validate(&sign_with(b"someone-else", &claims(NOW + 60)), NOW),
            Err(TokenRejection::InvalidSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(validator().validate("not-a-jwt", NOW), Err(TokenRejection::Malformed));
    }
}
