//! Configuration for the iSHARE PEP decision engine.

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

/// Engine configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PepConfig {
    /// Application id this PEP protects. Tokens must be issued for it.
    pub app_id: String,

    /// Token verification settings.
    pub token: TokenConfig,

    /// Lifetime of cached registry outcomes, in seconds. `0` disables caching.
    pub cache_time_secs: u64,

    /// Path patterns exempt from authorization (matchit syntax).
    pub public_paths: Vec<String>,

    /// Policy issuers whose evidence is accepted without a registry round trip.
    pub trusted_issuers: Vec<String>,

    /// Licenses a policy set must assert to be considered for matching.
    pub required_licenses: Vec<String>,

    /// Authorisation Registry endpoint. Without it only `trusted_issuers` evidence is accepted.
    pub registry: Option<RegistryConfig>,
}

impl Default for PepConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            token: TokenConfig::default(),
            cache_time_secs: 300,
            public_paths: Vec::new(),
            trusted_issuers: Vec::new(),
            required_licenses: Vec::new(),
            registry: None,
        }
    }
}

impl PepConfig {
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_time_secs)
    }
}

/// Signature algorithm accepted for bearer tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum TokenAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
    RS256,
}

/// Token verification settings.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenConfig {
    pub algorithm: TokenAlgorithm,

    /// Shared secret for the `HS*` algorithms.
    pub secret: SecretString,

    /// PEM-encoded public key for `RS256`.
    pub public_key_pem: Option<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            algorithm: TokenAlgorithm::HS256,
            secret: SecretString::from(""),
            public_key_pem: None,
        }
    }
}

/// Authorisation Registry endpoint and client behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// `http` or `https`.
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Path of the delegation endpoint.
    pub path: String,
    /// Per-attempt timeout.
    pub timeout_ms: u64,
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub retry_backoff_ms: u64,
    /// Registry answers that mean "recognized".
    pub recognized_tokens: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_owned(),
            host: "localhost".to_owned(),
            port: 443,
            path: "/delegate".to_owned(),
            timeout_ms: 3000,
            max_retries: 2,
            retry_backoff_ms: 100,
            recognized_tokens: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Full URL of the delegation endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if scheme/host/port/path do not form a valid URL.
    pub fn endpoint(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse(&format!(
            "{}://{}:{}{}",
            self.scheme, self.host, self.port, self.path
        ))
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
