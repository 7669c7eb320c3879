//! Evidence trust validation.
//!
//! Gates, in order, each short-circuiting:
//! 1. validity window (`Expired`)
//! 2. delegated subject vs. requester (`SubjectMismatch`)
//! 3. local trust anchors, then the decision cache, then the registry (`Untrusted`)
//!
//! The local checks run before any network call. Registry failures are
//! fail-closed and never cached.

use std::collections::HashSet;
use std::sync::Arc;

use ishare_pep_sdk::{AuthorisationRegistryClient, DelegationEvidence, DelegationMask};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::cache::{DecisionCache, TrustKey};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TrustError {
    #[error("delegation evidence is outside its validity window")]
    Expired,

    #[error("delegation evidence is issued to a different subject")]
    SubjectMismatch,

    #[error("delegation evidence is not trusted")]
    Untrusted,
}

pub struct EvidenceTrustValidator {
    registry: Option<Arc<dyn AuthorisationRegistryClient>>,
    cache: Arc<DecisionCache>,
    trusted_issuers: HashSet<String>,
}

impl EvidenceTrustValidator {
    #[must_use]
    pub fn new(
        registry: Option<Arc<dyn AuthorisationRegistryClient>>,
        cache: Arc<DecisionCache>,
        trusted_issuers: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            registry,
            cache,
            trusted_issuers: trusted_issuers.into_iter().collect(),
        }
    }

    /// Validate `evidence` for `requester_id` at `now` (epoch seconds).
    ///
    /// # Errors
    ///
    /// - `Expired` if `now` is outside `[notBefore, notOnOrAfter)`
    /// - `SubjectMismatch` if the evidence is delegated to someone else
    /// - `Untrusted` if the registry does not recognize the evidence or cannot be reached
    pub async fn validate(
        &self,
        evidence: &DelegationEvidence,
        requester_id: &str,
        now: i64,
    ) -> Result<(), TrustError> {
        if !evidence.is_valid_at(now) {
            return Err(TrustError::Expired);
        }

        if evidence.target.access_subject != requester_id {
            return Err(TrustError::SubjectMismatch);
        }

        if self.trusted_issuers.contains(&evidence.policy_issuer) {
            debug!(issuer = %evidence.policy_issuer, "evidence issued by a local trust anchor");
            return Ok(());
        }

        let mask = DelegationMask::from_evidence(evidence);
        let key = TrustKey::for_mask(&mask).map_err(|e| {
            warn!(error = %e, "failed to derive trust key");
            TrustError::Untrusted
        })?;

        if let Some(trusted) = self.cache.get(&key) {
            debug!(issuer = %key.policy_issuer, trusted, "decision cache hit");
            return outcome(trusted);
        }

        let Some(registry) = &self.registry else {
            debug!(issuer = %key.policy_issuer, "no registry configured for untrusted issuer");
            return Err(TrustError::Untrusted);
        };

        match registry.delegate(&mask).await {
            Ok(verdict) => {
                let trusted = verdict.is_trusted();
                debug!(issuer = %key.policy_issuer, trusted, "registry verdict");
                self.cache.insert(key, trusted);
                outcome(trusted)
            }
            Err(e) => {
                warn!(issuer = %key.policy_issuer, error = %e, "registry unavailable, failing closed");
                Err(TrustError::Untrusted)
            }
        }
    }
}

fn outcome(trusted: bool) -> Result<(), TrustError> {
    if trusted {
        Ok(())
    } else {
        Err(TrustError::Untrusted)
    }
}
