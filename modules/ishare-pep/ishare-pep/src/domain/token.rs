//! Bearer token verification.
//!
//! Checks the signature and structure of the token and extracts the
//! delegation evidence. Temporal validity of the evidence itself is left to
//! the trust validator so that "bad signature" and "evidence out of window"
//! stay distinguishable.

use ishare_pep_sdk::DelegationEvidence;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{TokenAlgorithm, TokenConfig};
use crate::domain::error::DomainError;

/// Claims that must be present in every token.
const REQUIRED_CLAIMS: [&str; 3] = ["id", "app_id", "delegationEvidence"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token has expired")]
    Expired,
}

/// Verified token contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject_id: String,
    pub app_id: String,
    pub trusted_apps: Vec<String>,
    pub display_name: Option<String>,
    pub delegation_evidence: DelegationEvidence,
}

impl VerifiedToken {
    /// Whether the token was issued for, or trusts, the given application.
    #[must_use]
    pub fn is_issued_for(&self, app_id: &str) -> bool {
        self.app_id == app_id || self.trusted_apps.iter().any(|app| app == app_id)
    }
}

#[derive(Deserialize)]
struct TokenClaims {
    id: String,
    app_id: String,
    #[serde(default)]
    trusted_apps: Vec<String>,
    #[serde(default, rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "delegationEvidence")]
    delegation_evidence: DelegationEvidence,
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidKey` if the configured key cannot be used
    /// with the configured algorithm.
    pub fn from_config(cfg: &TokenConfig) -> Result<Self, DomainError> {
        let (algorithm, key) = match cfg.algorithm {
            TokenAlgorithm::HS256 => (Algorithm::HS256, hmac_key(cfg)?),
            TokenAlgorithm::HS384 => (Algorithm::HS384, hmac_key(cfg)?),
            TokenAlgorithm::HS512 => (Algorithm::HS512, hmac_key(cfg)?),
            TokenAlgorithm::RS256 => {
                let pem = cfg.public_key_pem.as_deref().ok_or_else(|| {
                    DomainError::InvalidKey("RS256 requires `public_key_pem`".to_owned())
                })?;
                let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| DomainError::InvalidKey(e.to_string()))?;
                (Algorithm::RS256, key)
            }
        };

        let mut validation = Validation::new(algorithm);
        // Issuers typically mint these tokens without `exp`/`aud`; `exp` is still
        // enforced when present.
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        validation.leeway = 0;

        Ok(Self { key, validation })
    }

    /// Verify a raw token and extract its claims.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` if the signature or algorithm does not match
    /// - `Expired` if the token carries an `exp` claim in the past
    /// - `Malformed` if the token cannot be decoded or lacks required claims
    pub fn verify(&self, raw: &str) -> Result<VerifiedToken, TokenError> {
        let data = jsonwebtoken::decode::<Value>(raw, &self.key, &self.validation)
            .map_err(|e| classify(&e))?;

        let claims = data.claims;
        if let Some(missing) = REQUIRED_CLAIMS
            .iter()
            .find(|name| claims.get(**name).is_none_or(Value::is_null))
        {
            return Err(TokenError::Malformed(format!("missing claim `{missing}`")));
        }

        let claims: TokenClaims =
            serde_json::from_value(claims).map_err(|e| TokenError::Malformed(e.to_string()))?;

        Ok(VerifiedToken {
            subject_id: claims.id,
            app_id: claims.app_id,
            trusted_apps: claims.trusted_apps,
            display_name: claims.display_name,
            delegation_evidence: claims.delegation_evidence,
        })
    }
}

fn hmac_key(cfg: &TokenConfig) -> Result<DecodingKey, DomainError> {
    let secret = cfg.secret.expose_secret();
    if secret.is_empty() {
        return Err(DomainError::InvalidKey("token secret is empty".to_owned()));
    }
    Ok(DecodingKey::from_secret(secret.as_bytes()))
}

fn classify(err: &jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed(err.to_string()),
    }
}
