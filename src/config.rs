// src/config.rs

use crate::error::ConfigError;
use crate::validator::claims::Audience;
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Contains the validation settings applied to every bearer token.
#[derive(Debug, Clone)]
pub struct ValidationDetails {
    /// The single signing algorithm tokens must declare.
    /// Tokens declaring any other algorithm are rejected before key lookup.
    pub algorithm: Algorithm,
    /// The tolerance for clock skew when checking `exp`.
    /// Defaults to zero.
    pub leeway: Duration,
}

impl Default for ValidationDetails {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::RS256,
            leeway: Duration::ZERO,
        }
    }
}

/// Where and how often the identity provider's public keys are fetched.
#[derive(Debug, Clone)]
pub struct KeySetConfig {
    /// The JSON Web Key Set endpoint.
    pub jwks_uri: Url,
    /// How long a fetched key set is trusted when the response carries no
    /// `Cache-Control: max-age`.
    pub refresh_interval: Duration,
    /// Upper bound on a single key set fetch.
    pub fetch_timeout: Duration,
    /// Minimum age of the cached key set before an unknown `kid` may
    /// trigger a refetch.
    pub min_refetch_interval: Duration,
}

/// The main configuration for the authorization guard.
///
/// This struct should be constructed using the `ConfigBuilder`.
#[derive(Debug, Clone)]
pub struct Config {
    /// The `iss` claim every token must carry, compared byte for byte.
    pub issuer: String,
    /// Audiences accepted in the `aud` claim. A token passes if its
    /// audience contains any of them.
    pub audiences: Vec<String>,
    /// The specific validation parameters to apply to the token.
    pub validation: ValidationDetails,
    /// The source for obtaining token verification keys.
    pub key_set: KeySetConfig,
}

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(30);

/// A builder for creating a `Config` instance.
#[derive(Default)]
pub struct ConfigBuilder {
    issuer: Option<String>,
    audiences: Vec<String>,
    jwks_uri: Option<Url>,
    refresh_interval: Option<Duration>,
    fetch_timeout: Option<Duration>,
    min_refetch_interval: Option<Duration>,
    validation: ValidationDetails,
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the expected issuer, e.g. "https://tenant.auth.example.com/". Required.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Adds an accepted audience. At least one is required.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audiences.push(audience.into());
        self
    }

    /// Adds several accepted audiences.
    pub fn audiences<I, S>(mut self, audiences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audiences.extend(audiences.into_iter().map(Into::into));
        self
    }

    /// Sets the JWKS endpoint. If unset, `<issuer>/.well-known/jwks.json` is used.
    pub fn jwks_uri(mut self, url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        self.jwks_uri = Some(parsed);
        Ok(self)
    }

    /// Sets the signing algorithm tokens must use. Defaults to RS256.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.validation.algorithm = algorithm;
        self
    }

    /// Sets the clock skew tolerance for `exp`. Defaults to zero.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.validation.leeway = leeway;
        self
    }

    /// Sets the fallback key set TTL. Defaults to 24 hours.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Sets the key set fetch timeout. Defaults to 5 seconds.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Sets how old the key set must be before an unknown `kid` forces a refetch.
    /// Defaults to 30 seconds.
    pub fn min_refetch_interval(mut self, interval: Duration) -> Self {
        self.min_refetch_interval = Some(interval);
        self
    }

    /// Consumes the builder and returns a `Config` object.
    ///
    /// # Errors
    ///
    /// Returns an error if the issuer or audience is missing, if the JWKS URI
    /// cannot be derived, or if the algorithm is not an RSA signature scheme.
    pub fn build(self) -> Result<Config, ConfigError> {
        let issuer = self
            .issuer
            .filter(|issuer| !issuer.is_empty())
            .ok_or_else(|| ConfigError::MissingConfiguration("issuer".to_string()))?;

        let audiences: Vec<String> = self.audiences.into_iter().filter(|a| !a.is_empty()).collect();
        if audiences.is_empty() {
            return Err(ConfigError::MissingConfiguration("audience".to_string()));
        }

        check_algorithm(self.validation.algorithm)?;

        let jwks_uri = match self.jwks_uri {
            Some(uri) => uri,
            None => {
                let derived = format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'));
                Url::parse(&derived).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?
            }
        };

        Ok(Config {
            issuer,
            audiences,
            validation: self.validation,
            key_set: KeySetConfig {
                jwks_uri,
                refresh_interval: self.refresh_interval.unwrap_or(DEFAULT_REFRESH_INTERVAL),
                fetch_timeout: self.fetch_timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT),
                min_refetch_interval: self
                    .min_refetch_interval
                    .unwrap_or(DEFAULT_MIN_REFETCH_INTERVAL),
            },
        })
    }
}

fn check_algorithm(algorithm: Algorithm) -> Result<(), ConfigError> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Err(ConfigError::SymmetricAlgorithm(algorithm))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => Ok(()),
        other => Err(ConfigError::InvalidConfiguration(format!(
            "{other:?} is not an RSA algorithm; only RSA keys are published"
        ))),
    }
}

/// Serialisable form of the authorization settings, as found in a settings
/// file or the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub issuer: String,
    pub audience: Audience,
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default)]
    pub clock_skew_secs: u64,
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
}

impl AuthSettings {
    /// Reads `AUTH_ISSUER`, `AUTH_AUDIENCE` (comma separated), `AUTH_JWKS_URL`,
    /// `AUTH_CLOCK_SKEW_SECS`, `AUTH_JWKS_REFRESH_SECS` and `AUTH_JWKS_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingConfiguration(key.to_string()))
        };
        let seconds = |key: &str| -> Result<Option<u64>, ConfigError> {
            lookup(key)
                .map(|v| {
                    v.trim().parse::<u64>().map_err(|e| {
                        ConfigError::InvalidConfiguration(format!("{key}: {e}"))
                    })
                })
                .transpose()
        };

        let audiences: Vec<String> = required("AUTH_AUDIENCE")?
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
        let audience = match <[String; 1]>::try_from(audiences) {
            Ok([single]) => Audience::Single(single),
            Err(many) => Audience::Multiple(many),
        };

        Ok(Self {
            issuer: required("AUTH_ISSUER")?,
            audience,
            jwks_url: lookup("AUTH_JWKS_URL").filter(|v| !v.trim().is_empty()),
            clock_skew_secs: seconds("AUTH_CLOCK_SKEW_SECS")?.unwrap_or(0),
            refresh_interval_secs: seconds("AUTH_JWKS_REFRESH_SECS")?,
            fetch_timeout_secs: seconds("AUTH_JWKS_TIMEOUT_SECS")?,
        })
    }

    /// Validates the settings into a [`Config`].
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let mut builder = ConfigBuilder::new()
            .issuer(self.issuer)
            .audiences(self.audience.iter().map(str::to_string))
            .leeway(Duration::from_secs(self.clock_skew_secs));
        if let Some(url) = &self.jwks_url {
            builder = builder.jwks_uri(url)?;
        }
        if let Some(secs) = self.refresh_interval_secs {
            builder = builder.refresh_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.fetch_timeout_secs {
            builder = builder.fetch_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Settings for the HTTP service binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub auth: AuthSettings,
}

impl ServerSettings {
    /// Loads settings from the YAML file named by `CASTING_CONFIG`, or from
    /// the environment (`LISTEN_ADDR` plus the `AUTH_*` variables).
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("CASTING_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(path),
            _ => Ok(Self {
                listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| default_listen_addr()),
                auth: AuthSettings::from_env()?,
            }),
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}
