//! HTTP client for the iSHARE Authorisation Registry.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use ishare_pep_sdk::{AuthorisationRegistryClient, DelegationMask, RegistryError, RegistryVerdict};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::RegistryConfig;
use crate::domain::error::DomainError;

/// Field carrying the token in a JSON registry answer.
const DELEGATION_TOKEN_FIELD: &str = "delegation_token";

pub struct HttpRegistryClient {
    client: reqwest::Client,
    endpoint: Url,
    max_retries: u32,
    retry_backoff: Duration,
    recognized: HashSet<String>,
}

impl HttpRegistryClient {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidRegistry` if the endpoint is not a valid
    /// URL or the HTTP client cannot be constructed.
    pub fn new(cfg: &RegistryConfig) -> Result<Self, DomainError> {
        let endpoint = cfg
            .endpoint()
            .map_err(|e| DomainError::InvalidRegistry(format!("bad endpoint: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(|e| DomainError::InvalidRegistry(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            max_retries: cfg.max_retries,
            retry_backoff: cfg.retry_backoff(),
            recognized: cfg.recognized_tokens.iter().cloned().collect(),
        })
    }

    async fn post_once(&self, mask: &DelegationMask) -> Result<String, RegistryError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(mask)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::UnexpectedStatus(status.as_u16()));
        }

        response.text().await.map_err(classify)
    }

    fn verdict(&self, body: &str) -> RegistryVerdict {
        match extract_token(body) {
            Some(token) if self.recognized.contains(token.as_str()) => RegistryVerdict::Recognized,
            _ => RegistryVerdict::Unrecognized,
        }
    }
}

#[async_trait]
impl AuthorisationRegistryClient for HttpRegistryClient {
    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint, issuer = %mask.policy_issuer()))]
    async fn delegate(&self, mask: &DelegationMask) -> Result<RegistryVerdict, RegistryError> {
        let mut backoff = self.retry_backoff;
        let mut attempt = 0;

        loop {
            match self.post_once(mask).await {
                Ok(body) => {
                    let verdict = self.verdict(&body);
                    debug!(?verdict, attempt, "registry answered");
                    return Ok(verdict);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, backoff_ms = backoff.as_millis(), "registry call failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn classify(err: reqwest::Error) -> RegistryError {
    if err.is_timeout() {
        RegistryError::Timeout
    } else {
        RegistryError::Transport(err.to_string())
    }
}

/// Token carried by a registry answer: a raw string, a JSON string, or a JSON
/// object with a `delegation_token` field.
fn extract_token(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(token)) => Some(token),
        Ok(Value::Object(fields)) => fields
            .get(DELEGATION_TOKEN_FIELD)
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        Ok(_) => None,
        Err(_) => Some(trimmed.to_owned()),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::test_support::{now_epoch, sample_evidence};

    fn config_for(server: &MockServer) -> RegistryConfig {
        RegistryConfig {
            scheme: "http".to_owned(),
            host: server.host(),
            port: server.port(),
            max_retries: 0,
            retry_backoff_ms: 1,
            recognized_tokens: vec!["HELLO".to_owned()],
            ..RegistryConfig::default()
        }
    }

    fn mask() -> DelegationMask {
        DelegationMask::from_evidence(&sample_evidence(now_epoch()))
    }

    #[test]
    fn extracts_token_from_supported_shapes() {
        assert_eq!(extract_token("HELLO"), Some("HELLO".to_owned()));
        assert_eq!(extract_token(" HELLO\n"), Some("HELLO".to_owned()));
        assert_eq!(extract_token(r#""HELLO""#), Some("HELLO".to_owned()));
        assert_eq!(
            extract_token(r#"{"delegation_token":"HELLO"}"#),
            Some("HELLO".to_owned())
        );
        assert_eq!(extract_token(r#"{"other":"HELLO"}"#), None);
        assert_eq!(extract_token("[1,2]"), None);
        assert_eq!(extract_token(""), None);
    }

    #[tokio::test]
    async fn recognized_token_is_trusted() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/delegate")
                    .header("content-type", "application/json");
                then.status(200).body("HELLO");
            })
            .await;

        let client = HttpRegistryClient::new(&config_for(&server)).unwrap();
        let verdict = client.delegate(&mask()).await.unwrap();

        assert_eq!(verdict, RegistryVerdict::Recognized);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn other_token_is_unrecognized() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/delegate");
                then.status(200).body("NOT_HELLO");
            })
            .await;

        let client = HttpRegistryClient::new(&config_for(&server)).unwrap();

        assert_eq!(
            client.delegate(&mask()).await.unwrap(),
            RegistryVerdict::Unrecognized
        );
    }

    #[tokio::test]
    async fn json_delegation_token_is_understood() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/delegate");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "delegation_token": "HELLO" }));
            })
            .await;

        let client = HttpRegistryClient::new(&config_for(&server)).unwrap();

        assert_eq!(
            client.delegate(&mask()).await.unwrap(),
            RegistryVerdict::Recognized
        );
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/delegate");
                then.status(404);
            })
            .await;

        let mut cfg = config_for(&server);
        cfg.max_retries = 3;
        let client = HttpRegistryClient::new(&cfg).unwrap();

        assert_eq!(
            client.delegate(&mask()).await,
            Err(RegistryError::UnexpectedStatus(404))
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_surfaces_after_retries() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/delegate");
                then.status(503);
            })
            .await;

        let mut cfg = config_for(&server);
        cfg.max_retries = 2;
        let client = HttpRegistryClient::new(&cfg).unwrap();

        assert_eq!(
            client.delegate(&mask()).await,
            Err(RegistryError::UnexpectedStatus(503))
        );
    }

    #[tokio::test]
    async fn unreachable_registry_is_a_transport_error() {
        let cfg = RegistryConfig {
            scheme: "http".to_owned(),
            host: "127.0.0.1".to_owned(),
            port: 1,
            timeout_ms: 500,
            max_retries: 0,
            ..RegistryConfig::default()
        };
        let client = HttpRegistryClient::new(&cfg).unwrap();

        let err = client.delegate(&mask()).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Transport(_) | RegistryError::Timeout
        ));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let cfg = RegistryConfig {
            host: "bad host".to_owned(),
            ..RegistryConfig::default()
        };
        assert!(matches!(
            HttpRegistryClient::new(&cfg),
            Err(DomainError::InvalidRegistry(_))
        ));
    }
}
