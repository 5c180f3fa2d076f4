// src/error.rs

use http::StatusCode;
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The reasons a protected request can be rejected.
///
/// Every variant is terminal for the current request. The web layer maps
/// them to transport status codes through [`AuthError::status`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The request carries no `Authorization` header.
    #[error("Authorization header is expected")]
    MissingHeader,

    /// The `Authorization` header is not of the form `Bearer <token>`.
    #[error("Malformed authorization header: {0}")]
    MalformedHeader(String),

    /// The token is not three non-empty, decodable segments.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// The signed payload is not a valid claim set.
    #[error("Malformed claims: {0}")]
    MalformedClaims(String),

    /// The token header declares an algorithm other than the configured one.
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The token header is missing the 'kid' (Key ID) field.
    #[error("The token header is missing the 'kid' (Key ID) field")]
    MissingKeyId,

    /// No signing key with the token's 'kid' is published.
    #[error("Unable to find the appropriate key for kid: {0}")]
    UnknownKey(String),

    /// The identity provider's key set could not be fetched or parsed.
    ///
    /// The reason is kept for logs only; it never reaches the caller.
    #[error("Signing keys are temporarily unavailable")]
    KeySetUnavailable(String),

    /// The signature does not match the header and payload.
    #[error("Token signature is invalid")]
    InvalidSignature,

    /// The `iss` claim does not equal the expected issuer.
    #[error("Incorrect issuer, please check the token issuer")]
    InvalidIssuer,

    /// The `aud` claim does not contain the expected audience.
    #[error("Incorrect audience, please check the token audience")]
    InvalidAudience,

    /// The `exp` claim is not in the future.
    #[error("Token expired")]
    TokenExpired,

    /// The verified token lacks the permission the operation requires.
    #[error("Permission not found: {0}")]
    InsufficientScope(String),
}

impl AuthError {
    /// The status code the web layer must answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingHeader
            | AuthError::MalformedHeader(_)
            | AuthError::MalformedToken(_)
            | AuthError::MalformedClaims(_)
            | AuthError::UnsupportedAlgorithm(_)
            | AuthError::MissingKeyId
            | AuthError::UnknownKey(_)
            | AuthError::KeySetUnavailable(_)
            | AuthError::InvalidSignature
            | AuthError::InvalidIssuer
            | AuthError::InvalidAudience
            | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientScope(_) => StatusCode::FORBIDDEN,
        }
    }

    /// A stable machine-readable code for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "authorization_header_missing",
            AuthError::MalformedHeader(_)
            | AuthError::MalformedToken(_)
            | AuthError::UnsupportedAlgorithm(_)
            | AuthError::MissingKeyId
            | AuthError::UnknownKey(_) => "invalid_header",
            AuthError::KeySetUnavailable(_) => "key_set_unavailable",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::MalformedClaims(_) | AuthError::InvalidIssuer | AuthError::InvalidAudience => {
                "invalid_claims"
            }
            AuthError::TokenExpired => "token_expired",
            AuthError::InsufficientScope(_) => "unauthorized",
        }
    }

    /// Whether the failure is an infrastructure fault rather than a bad caller.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, AuthError::KeySetUnavailable(_))
    }
}

/// Errors raised while assembling a [`Config`](crate::config::Config) or key set.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration field is missing.
    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Symmetric algorithms cannot be verified against a public key set.
    #[error("Algorithm {0:?} is symmetric; only asymmetric algorithms are accepted")]
    SymmetricAlgorithm(Algorithm),

    /// A JWK or PEM key is malformed.
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// A settings file could not be read.
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A settings file is not valid YAML for the expected shape.
    #[error("Failed to parse settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// The JSON body every failed request answers with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: u16,
    pub message: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: status.as_u16(),
            message: message.into(),
        }
    }
}

impl From<&AuthError> for ErrorBody {
    fn from(err: &AuthError) -> Self {
        ErrorBody::new(err.status(), err.to_string())
    }
}
