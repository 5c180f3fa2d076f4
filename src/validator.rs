// src/validator.rs

pub mod claims;
pub(crate) mod token;

use crate::client::{JwksClient, KeySetProvider};
use crate::config::Config;
use crate::error::{AuthError, ConfigError};
use claims::{RawClaims, VerifiedClaims};
use jsonwebtoken::Algorithm;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use token::TokenSegments;
use tracing::{debug, instrument};

/// The bearer token verifier.
///
/// This struct is initialized with a `Config` and a key provider and should be
/// created once and reused for all requests. Each call runs the checks in a
/// fixed order and stops at the first failure:
///
/// 1. three non-empty segments
/// 2. header `alg` equals the configured algorithm
/// 3. header carries a `kid`
/// 4. the key provider resolves the `kid`, and the key's published `alg`, if any,
///    matches the header
/// 5. the signature verifies against that key
/// 6. the payload decodes as a claim set
/// 7. `iss`, then `aud`, then `exp`
#[derive(Clone)]
pub struct Validator {
    config: Arc<Config>,
    keys: Arc<dyn KeySetProvider>,
}

impl Validator {
    /// Creates a new `Validator` resolving keys through `keys`.
    pub fn new(config: Config, keys: Arc<dyn KeySetProvider>) -> Self {
        Self {
            config: Arc::new(config),
            keys,
        }
    }

    /// Creates a `Validator` backed by a [`JwksClient`] for `config.key_set`.
    pub fn with_jwks(config: Config) -> Result<Self, ConfigError> {
        let client = JwksClient::new(&config.key_set)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Verifies `token` against the current system time.
    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        self.verify_at(token, unix_now()).await
    }

    /// Verifies `token` as of `now` (seconds since the Unix epoch).
    #[instrument(skip(self, token), fields(kid))]
    pub async fn verify_at(&self, token: &str, now: u64) -> Result<VerifiedClaims, AuthError> {
        let segments = TokenSegments::split(token)?;

        let header = segments.header()?;
        let algorithm = self.check_algorithm(&header.alg)?;

        let kid = header
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(AuthError::MissingKeyId)?;
        tracing::Span::current().record("kid", kid);

        let key = self.keys.signing_key(kid).await?;
        if key.alg().is_some_and(|published| published != header.alg) {
            return Err(AuthError::UnsupportedAlgorithm(header.alg.clone()));
        }
        segments.verify_signature(&key, algorithm)?;

        let raw: RawClaims = segments.claims()?;
        let claims = self.check_claims(raw, now)?;
        debug!(sub = %claims.subject(), "Token verified");
        Ok(claims)
    }

    fn check_algorithm(&self, declared: &str) -> Result<Algorithm, AuthError> {
        match Algorithm::from_str(declared) {
            Ok(alg) if alg == self.config.validation.algorithm => Ok(alg),
            _ => Err(AuthError::UnsupportedAlgorithm(declared.to_string())),
        }
    }

    fn check_claims(&self, raw: RawClaims, now: u64) -> Result<VerifiedClaims, AuthError> {
        let subject = raw
            .sub
            .ok_or_else(|| AuthError::MalformedClaims("missing 'sub'".to_string()))?;
        let expires_at = raw
            .exp
            .ok_or_else(|| AuthError::MalformedClaims("missing 'exp'".to_string()))?;

        let issuer = raw
            .iss
            .filter(|iss| *iss == self.config.issuer)
            .ok_or(AuthError::InvalidIssuer)?;

        let audience = raw
            .aud
            .filter(|aud| self.config.audiences.iter().any(|expected| aud.contains(expected)))
            .ok_or(AuthError::InvalidAudience)?;

        let leeway = self.config.validation.leeway.as_secs();
        if expires_at.saturating_add(leeway) <= now {
            return Err(AuthError::TokenExpired);
        }

        Ok(VerifiedClaims {
            subject,
            issuer,
            audience,
            expires_at,
            issued_at: raw.iat,
            permissions: raw.permissions.unwrap_or_default(),
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
