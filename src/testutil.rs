// src/testutil.rs

//! Helpers for unit tests: a fixed RSA key pair and token builders.

use crate::client::StaticKeySet;
use crate::config::{Config, ConfigBuilder};
use crate::model::SigningKey;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

pub const ISSUER: &str = "https://casting.test.local/";
pub const AUDIENCE: &str = "casting";
pub const KID: &str = "test-kid";

const PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/test_rsa_key.pem");
const OTHER_PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/other_rsa_key.pem");

fn private_key(pem: &str) -> RsaPrivateKey {
    RsaPrivateKey::from_pkcs8_pem(pem).unwrap()
}

fn encoding_key(pem: &str) -> EncodingKey {
    let der = private_key(pem).to_pkcs1_der().unwrap();
    EncodingKey::from_rsa_der(der.as_bytes())
}

fn components(pem: &str) -> (String, String) {
    let public_key = private_key(pem).to_public_key();
    (
        URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    )
}

/// Base64url `n` and `e` of the primary test key.
pub fn public_components() -> (String, String) {
    components(PRIVATE_KEY_PEM)
}

/// Base64url `n` and `e` of a second, unrelated key.
pub fn other_public_components() -> (String, String) {
    components(OTHER_PRIVATE_KEY_PEM)
}

pub fn signing_key(kid: &str) -> SigningKey {
    let (n, e) = public_components();
    SigningKey::from_rsa_components(kid, &n, &e).unwrap()
}

/// A provider publishing the primary test key under [`KID`].
pub fn static_keys() -> StaticKeySet {
    StaticKeySet::new([signing_key(KID)])
}

pub fn config() -> Config {
    ConfigBuilder::new()
        .issuer(ISSUER)
        .audience(AUDIENCE)
        .jwks_uri("https://casting.test.local/.well-known/jwks.json")
        .unwrap()
        .build()
        .unwrap()
}

pub fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// A payload that passes every claim check for an hour.
pub fn valid_claims(permissions: &[&str]) -> Value {
    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": "auth0|casting-director",
        "iat": now(),
        "exp": now() + 3600,
        "permissions": permissions,
    })
}

/// Signs `payload` with the primary key, declaring RS256 and `kid`.
pub fn sign_token(kid: &str, payload: &Value) -> String {
    let header = json!({"alg": "RS256", "typ": "JWT", "kid": kid});
    sign_raw(&header.to_string(), &payload.to_string(), PRIVATE_KEY_PEM)
}

/// Signs `payload` with the second key, declaring RS256 and `kid`.
pub fn sign_token_with_other_key(kid: &str, payload: &Value) -> String {
    let header = json!({"alg": "RS256", "typ": "JWT", "kid": kid});
    sign_raw(&header.to_string(), &payload.to_string(), OTHER_PRIVATE_KEY_PEM)
}

/// Builds a token from arbitrary header and payload text, RS256-signed with the primary key.
pub fn sign_raw_token(header: &str, payload: &str) -> String {
    sign_raw(header, payload, PRIVATE_KEY_PEM)
}

fn sign_raw(header: &str, payload: &str, pem: &str) -> String {
    let message = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let signature = jsonwebtoken::crypto::sign(message.as_bytes(), &encoding_key(pem), Algorithm::RS256).unwrap();
    format!("{message}.{signature}")
}
