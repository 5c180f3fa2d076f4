// src/model.rs

use crate::error::ConfigError;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{DecodePaddingMode, Engine};
use jsonwebtoken::DecodingKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// URL-safe base64 that accepts input with or without `=` padding.
pub(crate) const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Represents a single JSON Web Key (JWK) as defined in RFC 7517.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonWebKey {
    pub kid: Option<String>,
    pub kty: String,
    #[serde(rename = "use")]
    pub use_purpose: Option<String>,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
}

/// Represents a JSON Web Key Set (JWKS), which is a collection of JWKs.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

/// One RSA public key published by the identity provider.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    alg: Option<String>,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Builds a key from base64url encoded modulus and exponent.
    ///
    /// Both are read as unsigned big-endian integers; padding is optional.
    pub fn from_rsa_components(kid: impl Into<String>, n: &str, e: &str) -> Result<Self, ConfigError> {
        let modulus = URL_SAFE_LENIENT
            .decode(n)
            .map_err(|err| ConfigError::InvalidKeyFormat(format!("modulus 'n': {err}")))?;
        let exponent = URL_SAFE_LENIENT
            .decode(e)
            .map_err(|err| ConfigError::InvalidKeyFormat(format!("exponent 'e': {err}")))?;

        let public_key = RsaPublicKey::new(BigUint::from_bytes_be(&modulus), BigUint::from_bytes_be(&exponent))
            .map_err(|err| ConfigError::InvalidKeyFormat(err.to_string()))?;

        Ok(Self {
            kid: kid.into(),
            alg: None,
            decoding_key: DecodingKey::from_rsa_raw_components(
                &public_key.n().to_bytes_be(),
                &public_key.e().to_bytes_be(),
            ),
        })
    }

    /// Builds a key from a JWK entry. Only RSA signing keys with a `kid` are accepted.
    pub fn from_jwk(jwk: &JsonWebKey) -> Result<Self, ConfigError> {
        if jwk.kty != "RSA" {
            return Err(ConfigError::InvalidKeyFormat(format!("unsupported key type '{}'", jwk.kty)));
        }
        if let Some(purpose) = jwk.use_purpose.as_deref() {
            if purpose != "sig" {
                return Err(ConfigError::InvalidKeyFormat(format!("key use '{purpose}' is not 'sig'")));
            }
        }
        let kid = jwk
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| ConfigError::InvalidKeyFormat("RSA key missing 'kid'".to_string()))?;
        let n = jwk
            .n
            .as_deref()
            .ok_or_else(|| ConfigError::InvalidKeyFormat("RSA key missing 'n' component".to_string()))?;
        let e = jwk
            .e
            .as_deref()
            .ok_or_else(|| ConfigError::InvalidKeyFormat("RSA key missing 'e' component".to_string()))?;

        let mut key = Self::from_rsa_components(kid, n, e)?;
        key.alg = jwk.alg.clone();
        Ok(key)
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The `alg` the key was published with, if any.
    pub fn alg(&self) -> Option<&str> {
        self.alg.as_deref()
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

/// An immutable snapshot of the published keys, indexed by `kid`.
///
/// A refresh never edits a snapshot; it builds a new one.
#[derive(Debug)]
pub struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,
    fetched_at: Instant,
    ttl: Duration,
}

impl KeySet {
    /// Builds a snapshot from keys already parsed. The first key wins on a duplicate `kid`.
    pub fn new(keys: impl IntoIterator<Item = SigningKey>, ttl: Duration) -> Self {
        let mut map = HashMap::new();
        for key in keys {
            if map.contains_key(key.kid()) {
                warn!(kid = %key.kid(), "Duplicate kid in key set; keeping the first occurrence");
                continue;
            }
            map.insert(key.kid.clone(), Arc::new(key));
        }
        Self {
            keys: map,
            fetched_at: Instant::now(),
            ttl,
        }
    }

    /// Builds a snapshot from a fetched JWKS document, skipping unusable keys.
    pub fn from_jwks(jwks: JsonWebKeySet, ttl: Duration) -> Self {
        let usable = jwks.keys.iter().filter_map(|jwk| match SigningKey::from_jwk(jwk) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(kid = ?jwk.kid, kty = %jwk.kty, error = %err, "Skipping unusable JWK");
                None
            }
        });
        Self::new(usable, ttl)
    }

    pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Time since this snapshot was built.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// How long this snapshot may be served from cache.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
