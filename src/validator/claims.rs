// src/validator/claims.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The `aud` claim: a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        self.iter().any(|a| a == audience)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Audience::Single(single) => std::slice::from_ref(single),
            Audience::Multiple(many) => many,
        };
        slice.iter().map(String::as_str)
    }
}

/// The payload as it appears on the wire, before any claim check.
#[derive(Debug, Deserialize)]
pub(crate) struct RawClaims {
    pub iss: Option<String>,
    pub aud: Option<Audience>,
    pub exp: Option<u64>,
    pub sub: Option<String>,
    pub iat: Option<u64>,
    pub permissions: Option<BTreeSet<String>>,
}

/// A signature-checked, claim-checked token payload.
///
/// Only the validator constructs these, and nothing mutates them afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedClaims {
    pub(crate) subject: String,
    pub(crate) issuer: String,
    pub(crate) audience: Audience,
    pub(crate) expires_at: u64,
    pub(crate) issued_at: Option<u64>,
    pub(crate) permissions: BTreeSet<String>,
}

impl VerifiedClaims {
    /// The opaque caller identity (`sub`).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    /// `exp`, in seconds since the Unix epoch.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn issued_at(&self) -> Option<u64> {
        self.issued_at
    }

    /// Granted permissions; empty when the token carries none.
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}
