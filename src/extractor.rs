// src/extractor.rs

use crate::error::AuthError;
use http::header::AUTHORIZATION;
use http::HeaderMap;

/// Pulls the bearer token out of the `Authorization` header.
///
/// The header must be exactly `Bearer <token>`: two parts separated by a
/// single space, the scheme spelled with that exact case.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingHeader)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedHeader("Authorization header is not visible ASCII".to_string()))?;

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(*token),
        ["Bearer", _] => Err(AuthError::MalformedHeader("Token not found".to_string())),
        [_, _] => Err(AuthError::MalformedHeader(
            "Authorization header must start with \"Bearer\"".to_string(),
        )),
        _ => Err(AuthError::MalformedHeader(
            "Authorization header must be bearer token".to_string(),
        )),
    }
}
