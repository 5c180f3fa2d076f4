// src/validator/token.rs

use crate::error::AuthError;
use crate::model::{SigningKey, URL_SAFE_LENIENT};
use base64::Engine;
use jsonwebtoken::Algorithm;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// The decoded first segment. Only used to pick a key.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenHeader {
    pub alg: String,
    pub kid: Option<String>,
}

/// A compact token split into its three segments.
#[derive(Debug)]
pub(crate) struct TokenSegments<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
    signing_input: &'a str,
}

impl<'a> TokenSegments<'a> {
    pub fn split(token: &'a str) -> Result<Self, AuthError> {
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| AuthError::MalformedToken("expected three segments".to_string()))?;
        let (header, payload) = signing_input
            .split_once('.')
            .ok_or_else(|| AuthError::MalformedToken("expected three segments".to_string()))?;

        if payload.contains('.') {
            return Err(AuthError::MalformedToken("expected three segments".to_string()));
        }
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(AuthError::MalformedToken("empty segment".to_string()));
        }

        Ok(Self {
            header,
            payload,
            signature,
            signing_input,
        })
    }

    pub fn header(&self) -> Result<TokenHeader, AuthError> {
        decode_json(self.header).map_err(|reason| AuthError::MalformedToken(format!("header: {reason}")))
    }

    /// Checks the signature over `header.payload` with `key`.
    pub fn verify_signature(&self, key: &SigningKey, algorithm: Algorithm) -> Result<(), AuthError> {
        let signature = self.signature.trim_end_matches('=');
        match jsonwebtoken::crypto::verify(signature, self.signing_input.as_bytes(), key.decoding_key(), algorithm) {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(AuthError::InvalidSignature),
        }
    }

    pub fn claims<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        decode_json(self.payload).map_err(AuthError::MalformedClaims)
    }
}

fn decode_json<T: DeserializeOwned>(segment: &str) -> Result<T, String> {
    let bytes = URL_SAFE_LENIENT.decode(segment).map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}
