// tests/common/mod.rs

//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use casting_guard::prelude::*;
use jsonwebtoken::{encode, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

pub const ISSUER: &str = "https://casting.test.local/";
pub const AUDIENCE: &str = "casting";

const PRIVATE_KEY_PEM: &str = include_str!("../fixtures/test_rsa_key.pem");
const OTHER_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/other_rsa_key.pem");

/// One of the two fixture key pairs.
#[derive(Debug, Clone, Copy)]
pub enum TestKey {
    Primary,
    Rotated,
}

impl TestKey {
    fn private_key(self) -> RsaPrivateKey {
        let pem = match self {
            TestKey::Primary => PRIVATE_KEY_PEM,
            TestKey::Rotated => OTHER_PRIVATE_KEY_PEM,
        };
        RsaPrivateKey::from_pkcs8_pem(pem).expect("fixture key must parse")
    }

    /// The public half as a JWK published under `kid`.
    pub fn jwk(self, kid: &str) -> Value {
        let public_key = self.private_key().to_public_key();
        json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": kid,
            "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        })
    }

    /// Signs `claims` with RS256, naming `kid` in the header.
    pub fn sign(self, kid: &str, claims: &Value) -> String {
        let der = self.private_key().to_pkcs1_der().expect("fixture key must encode");
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &EncodingKey::from_rsa_der(der.as_bytes())).expect("signing must succeed")
    }
}

/// A JWKS document holding `keys`.
pub fn jwks(keys: &[Value]) -> Value {
    json!({ "keys": keys })
}

pub fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// Claims that pass every check for the next hour.
pub fn claims(permissions: &[&str]) -> Value {
    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": "auth0|casting-assistant",
        "iat": now(),
        "exp": now() + 3600,
        "permissions": permissions,
    })
}

pub fn bearer(token: &str) -> http::HeaderMap {
    let mut headers = http::HeaderMap::new();
    headers.insert(
        http::header::AUTHORIZATION,
        http::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    headers
}
