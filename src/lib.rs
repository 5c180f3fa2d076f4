// src/lib.rs

//! Bearer-token authorization for the casting agency API.
//!
//! A request is admitted when its `Authorization: Bearer <jwt>` header
//! carries an RS256 token signed by one of the identity provider's published
//! keys, issued for the configured audience, unexpired, and granting the
//! permission the operation requires.

pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod guard;
pub mod model;
pub mod permission;
#[cfg(feature = "server")]
pub mod server;
pub mod validator;

#[cfg(test)]
mod testutil;

/// The public prelude for the `casting-guard` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::client::{JwksClient, KeySetProvider, StaticKeySet};
    pub use crate::config::{Config, ConfigBuilder};
    pub use crate::error::{AuthError, ConfigError};
    pub use crate::guard::AuthorizationGuard;
    pub use crate::validator::claims::VerifiedClaims;
    pub use crate::validator::Validator;
    pub use jsonwebtoken::Algorithm;
}
