#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ishare_pep_sdk::{
    AccessTarget, AuthorisationRegistryClient, DelegationEvidence, DelegationMask, Effect,
    Environment, Policy, PolicySet, PolicySetTarget, PolicyTarget, RegistryError, RegistryVerdict,
    ResourceTarget, Rule,
};
use jsonwebtoken::{EncodingKey, Header};
use secrecy::SecretString;
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::config::{PepConfig, TokenAlgorithm, TokenConfig};

pub const SECRET: &str = "shhhhh";
pub const APP_ID: &str = "application_id";
pub const SUBJECT: &str = "EU.EORI.NLNOCHEAPER";
pub const ISSUER: &str = "EU.EORI.NLPACKETDEL";
pub const LICENSE: &str = "ISHARE.0001";

#[must_use]
pub fn now_epoch() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[must_use]
pub fn policy(
    resource_type: &str,
    identifiers: &[&str],
    actions: &[&str],
    effect: Effect,
) -> Policy {
    Policy {
        target: PolicyTarget {
            resource: ResourceTarget {
                resource_type: resource_type.to_owned(),
                identifiers: identifiers.iter().map(|s| (*s).to_owned()).collect(),
                attributes: vec!["*".to_owned()],
            },
            actions: actions.iter().map(|s| (*s).to_owned()).collect(),
        },
        rules: vec![Rule { effect }],
    }
}

#[must_use]
pub fn policy_set(licenses: &[&str], policies: Vec<Policy>) -> PolicySet {
    PolicySet {
        max_delegation_depth: 1,
        target: PolicySetTarget {
            environment: Environment {
                licenses: licenses.iter().map(|s| (*s).to_owned()).collect(),
            },
        },
        policies,
    }
}

/// Evidence granting `SUBJECT` read/patch on temperature sensors and read on
/// soil sensors, valid for a window around `now`.
#[must_use]
pub fn sample_evidence(now: i64) -> DelegationEvidence {
    DelegationEvidence {
        not_before: now - 2000,
        not_on_or_after: now + 2000,
        policy_issuer: ISSUER.to_owned(),
        target: AccessTarget {
            access_subject: SUBJECT.to_owned(),
        },
        policy_sets: vec![policy_set(
            &[LICENSE],
            vec![
                policy("TemperatureSensor", &["*"], &["GET", "PATCH"], Effect::Permit),
                policy("SoilSensor", &["*"], &["GET"], Effect::Permit),
            ],
        )],
    }
}

/// Token claims for `SUBJECT` bound to `APP_ID`.
#[must_use]
pub fn claims_for(evidence: &DelegationEvidence) -> Value {
    json!({
        "id": SUBJECT,
        "app_id": APP_ID,
        "trusted_apps": [],
        "displayName": "No Cheaper",
        "delegationEvidence": evidence,
    })
}

/// HS256 token signed with `SECRET`.
///
/// # Panics
///
/// Panics if the claims cannot be encoded.
#[must_use]
pub fn mint_token(claims: &Value) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to mint token")
}

#[must_use]
pub fn token_config() -> TokenConfig {
    TokenConfig {
        algorithm: TokenAlgorithm::HS256,
        secret: SecretString::from(SECRET),
        public_key_pem: None,
    }
}

/// Config bound to `APP_ID` with `/public` exempt and no registry.
#[must_use]
pub fn test_config() -> PepConfig {
    PepConfig {
        app_id: APP_ID.to_owned(),
        token: token_config(),
        public_paths: vec!["/public".to_owned()],
        ..PepConfig::default()
    }
}

/// Registry fake with a fixed answer that counts calls.
pub struct CountingRegistry {
    answer: Result<RegistryVerdict, fn() -> RegistryError>,
    calls: AtomicUsize,
}

impl CountingRegistry {
    #[must_use]
    pub fn answering(verdict: RegistryVerdict) -> Self {
        Self {
            answer: Ok(verdict),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing(error: fn() -> RegistryError) -> Self {
        Self {
            answer: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorisationRegistryClient for CountingRegistry {
    async fn delegate(&self, _mask: &DelegationMask) -> Result<RegistryVerdict, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.map_err(|error| error())
    }
}
