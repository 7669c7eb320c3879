//! Server configuration: YAML file plus `ISHARE_PEP__` environment overrides.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use ishare_pep::PepConfig;
use serde::Deserialize;

/// Prefix for environment overrides; `__` separates nested keys,
/// e.g. `ISHARE_PEP__PEP__CACHE_TIME_SECS=60`.
pub const ENV_PREFIX: &str = "ISHARE_PEP__";

/// Default cap on buffered request and response bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Address the proxy listens on.
    pub listen: SocketAddr,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
    /// Largest request body buffered for authorization.
    pub max_body_bytes: usize,
    pub pep: PepConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backend: BackendConfig::default(),
            logging: LoggingConfig::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            pep: PepConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` (if given), then environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or any layer fails to deserialize.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            anyhow::ensure!(path.exists(), "config file {} not found", path.display());
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }
}

/// Data service that receives permitted requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_owned(),
            host: "localhost".to_owned(),
            port: 1026,
            timeout_ms: 10_000,
        }
    }
}

impl BackendConfig {
    /// Base URL of the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if scheme/host/port do not form a valid URL.
    pub fn base_url(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse(&format!("{}://{}:{}", self.scheme, self.host, self.port))
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}
