//! Signing key material used to verify token signatures.
//!
//! Keys come from the identity provider's JWKS document (loaded once at
//! startup) and/or from configuration. The resulting [`KeyMaterial`] is
//! immutable and shared by reference across requests.

use std::fmt;

use jsonwebtoken::{
    Algorithm, DecodingKey,
    jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse},
};
use tracing::{debug, warn};

use crate::Result;
use crate::config::StaticKeyConfig;

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];
const HMAC_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// A verification key with the algorithms it may be used with.
#[derive(Clone)]
pub struct SigningKey {
    kid: Option<String>,
    algorithms: Vec<Algorithm>,
    key: DecodingKey,
}

impl SigningKey {
    /// Key id, if any
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Decoding key for `jsonwebtoken`
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }

    fn supports(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

/// Immutable set of verification keys.
#[derive(Debug, Clone, Default)]
pub struct KeyMaterial {
    keys: Vec<SigningKey>,
}

impl KeyMaterial {
    /// Empty key set (every token fails with an unknown key)
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Single HMAC key
    #[must_use]
    pub fn hmac(kid: Option<&str>, secret: &[u8]) -> Self {
        Self {
            keys: vec![SigningKey {
                kid: kid.map(str::to_owned),
                algorithms: HMAC_ALGORITHMS.to_vec(),
                key: DecodingKey::from_secret(secret),
            }],
        }
    }

    /// Keys usable for signature verification from a JWKS document.
    ///
    /// Encryption keys and keys that cannot be converted are skipped.
    #[must_use]
    pub fn from_jwks(jwks: &JwkSet) -> Self {
        let keys: Vec<SigningKey> = jwks.keys.iter().filter_map(signing_key_from_jwk).collect();
        debug!(loaded = keys.len(), published = jwks.keys.len(), "Loaded JWKS signing keys");
        Self { keys }
    }

    /// Keys supplied through configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a PEM file cannot be read or parsed, or an entry
    /// carries neither a secret nor a PEM file.
    pub fn from_static(configs: &[StaticKeyConfig]) -> Result<Self> {
        let mut keys = Vec::with_capacity(configs.len());
        for cfg in configs {
            if let Some(secret) = cfg.resolve_secret() {
                keys.push(SigningKey {
                    kid: cfg.kid.clone(),
                    algorithms: HMAC_ALGORITHMS.to_vec(),
                    key: DecodingKey::from_secret(secret.as_bytes()),
                });
            } else if let Some(ref path) = cfg.rsa_pem_file {
                let pem = std::fs::read(path)?;
                keys.push(SigningKey {
                    kid: cfg.kid.clone(),
                    algorithms: RSA_ALGORITHMS.to_vec(),
                    key: DecodingKey::from_rsa_pem(&pem)?,
                });
            } else {
                return Err(crate::Error::Config(format!(
                    "static key {:?} needs either `secret` or `rsa_pem_file`",
                    cfg.kid
                )));
            }
        }
        Ok(Self { keys })
    }

    /// Combine two key sets
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.keys.extend(other.keys);
        self
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Select the key for a token header.
    ///
    /// With a `kid`, the key with that id must support `alg`; if no key has
    /// that id, a single key configured without an id that supports `alg`
    /// is used. Without a `kid`, a key is chosen only if exactly one key
    /// supports `alg`.
    #[must_use]
    pub fn select(&self, kid: Option<&str>, alg: Algorithm) -> Option<&SigningKey> {
        if let Some(kid) = kid {
            if let Some(key) = self
                .keys
                .iter()
                .find(|k| k.kid.as_deref() == Some(kid) && k.supports(alg))
            {
                return Some(key);
            }
            return single(self.keys.iter().filter(|k| k.kid.is_none() && k.supports(alg)));
        }
        single(self.keys.iter().filter(|k| k.supports(alg)))
    }
}

fn single<'a>(mut candidates: impl Iterator<Item = &'a SigningKey>) -> Option<&'a SigningKey> {
    match (candidates.next(), candidates.next()) {
        (Some(key), None) => Some(key),
        _ => None,
    }
}

fn signing_key_from_jwk(jwk: &Jwk) -> Option<SigningKey> {
    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return None;
    }
    let kid = jwk.common.key_id.clone();
    let declared = jwk.common.key_algorithm.as_ref().and_then(signature_algorithm);

    let (key, family) = match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => (
            DecodingKey::from_rsa_components(&rsa.n, &rsa.e).ok()?,
            RSA_ALGORITHMS.to_vec(),
        ),
        AlgorithmParameters::EllipticCurve(ec) => {
            let alg = match ec.curve {
                EllipticCurve::P256 => Algorithm::ES256,
                EllipticCurve::P384 => Algorithm::ES384,
                _ => {
                    warn!(kid = ?kid, curve = ?ec.curve, "Unsupported JWK curve, skipping");
                    return None;
                }
            };
            (DecodingKey::from_ec_components(&ec.x, &ec.y).ok()?, vec![alg])
        }
        AlgorithmParameters::OctetKey(oct) => (
            DecodingKey::from_base64_secret(&oct.value).ok()?,
            HMAC_ALGORITHMS.to_vec(),
        ),
        AlgorithmParameters::OctetKeyPair(okp) => (
            DecodingKey::from_ed_components(&okp.x).ok()?,
            vec![Algorithm::EdDSA],
        ),
    };

    let algorithms = match declared {
        Some(alg) if family.contains(&alg) => vec![alg],
        Some(alg) => {
            warn!(kid = ?kid, alg = ?alg, "JWK algorithm does not match key type, skipping");
            return None;
        }
        None => family,
    };

    Some(SigningKey {
        kid,
        algorithms,
        key,
    })
}

fn signature_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwks(value: serde_json::Value) -> JwkSet {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn select_by_kid_requires_matching_algorithm() {
        let keys = KeyMaterial::hmac(Some("k1"), b"secret");
        assert!(keys.select(Some("k1"), Algorithm::HS256).is_some());
        assert!(keys.select(Some("k1"), Algorithm::RS256).is_none());
        assert!(keys.select(Some("k2"), Algorithm::HS256).is_none());
    }

    #[test]
    fn select_without_kid_needs_a_single_candidate() {
        let one = KeyMaterial::hmac(None, b"a");
        assert!(one.select(None, Algorithm::HS256).is_some());

        let two = KeyMaterial::hmac(Some("a"), b"a").merge(KeyMaterial::hmac(Some("b"), b"b"));
        assert!(two.select(None, Algorithm::HS256).is_none());
        assert!(two.select(Some("b"), Algorithm::HS256).is_some());
    }

    #[test]
    fn unmatched_kid_falls_back_to_single_unnamed_key() {
        let unnamed = KeyMaterial::hmac(None, b"a");
        assert!(unnamed.select(Some("rotated"), Algorithm::HS256).is_some());
        assert!(unnamed.select(Some("rotated"), Algorithm::RS256).is_none());

        let mixed = KeyMaterial::hmac(Some("k1"), b"a").merge(KeyMaterial::hmac(None, b"b"));
        let picked = mixed.select(Some("other"), Algorithm::HS256).unwrap();
        assert_eq!(picked.kid(), None);
        assert_eq!(mixed.select(Some("k1"), Algorithm::HS256).unwrap().kid(), Some("k1"));

        let two_unnamed = KeyMaterial::hmac(None, b"a").merge(KeyMaterial::hmac(None, b"b"));
        assert!(two_unnamed.select(Some("k1"), Algorithm::HS256).is_none());
    }

    #[test]
    fn jwks_oct_key_is_loaded_and_enc_keys_skipped() {
        let set = jwks(serde_json::json!({
            "keys": [
                {"kty": "oct", "kid": "sig", "use": "sig", "alg": "HS256", "k": "c2VjcmV0LWtleS1mb3ItdGVzdHM"},
                {"kty": "oct", "kid": "enc", "use": "enc", "k": "c2VjcmV0LWtleS1mb3ItdGVzdHM"}
            ]
        }));

        let keys = KeyMaterial::from_jwks(&set);
        assert_eq!(keys.len(), 1);
        assert!(keys.select(Some("sig"), Algorithm::HS256).is_some());
        assert!(keys.select(Some("sig"), Algorithm::HS512).is_none());
    }

    #[test]
    fn static_secret_supports_all_hmac_algorithms() {
        let cfg = StaticKeyConfig {
            kid: Some("dev".to_string()),
            secret: Some("plain-secret".to_string()),
            rsa_pem_file: None,
        };
        let keys = KeyMaterial::from_static(&[cfg]).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys.select(Some("dev"), Algorithm::HS384).and_then(SigningKey::kid), Some("dev"));
    }

    #[test]
    fn static_entry_without_material_is_rejected() {
        let cfg = StaticKeyConfig::default();
        assert!(KeyMaterial::from_static(&[cfg]).is_err());
    }

    #[test]
    fn missing_pem_file_is_an_io_error() {
        let cfg = StaticKeyConfig {
            kid: None,
            secret: None,
            rsa_pem_file: Some("/nonexistent/realm.pem".into()),
        };
        assert!(matches!(KeyMaterial::from_static(&[cfg]), Err(crate::Error::Io(_))));
    }
}
