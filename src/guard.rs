// src/guard.rs

use crate::error::AuthError;
use crate::extractor::extract_bearer_token;
use crate::permission::require_permission;
use crate::validator::claims::VerifiedClaims;
use crate::validator::Validator;
use http::HeaderMap;
use std::future::Future;
use tracing::{debug, error, instrument, warn};

/// Wraps protected operations behind token verification and a permission check.
///
/// The guard holds no per-request state; all shared state lives in the
/// validator's key provider.
#[derive(Clone)]
pub struct AuthorizationGuard {
    validator: Validator,
}

impl AuthorizationGuard {
    pub fn new(validator: Validator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Extracts, verifies and permission-checks the request's bearer token.
    #[instrument(skip_all, fields(permission = %required))]
    pub async fn check(&self, required: &str, headers: &HeaderMap) -> Result<VerifiedClaims, AuthError> {
        let outcome = self.run_gates(required, headers).await;
        match &outcome {
            Ok(claims) => debug!(sub = %claims.subject(), "Request authorized"),
            Err(e) if e.is_infrastructure() => {
                error!(error = ?e, "Authorization aborted: identity provider keys unavailable")
            }
            Err(e) => warn!(error = %e, code = e.code(), "Request rejected"),
        }
        outcome
    }

    async fn run_gates(&self, required: &str, headers: &HeaderMap) -> Result<VerifiedClaims, AuthError> {
        let token = extract_bearer_token(headers)?;
        let claims = self.validator.verify(token).await?;
        require_permission(&claims, required)?;
        Ok(claims)
    }

    /// Runs `operation` with the caller's claims if the request holds `required`.
    ///
    /// On any authorization failure the operation is never invoked.
    pub async fn authorize<F, Fut, T>(
        &self,
        required: &str,
        headers: &HeaderMap,
        operation: F,
    ) -> Result<T, AuthError>
    where
        F: FnOnce(VerifiedClaims) -> Fut,
        Fut: Future<Output = T>,
    {
        let claims = self.check(required, headers).await?;
        Ok(operation(claims).await)
    }
}
