//! Outbound seam to the iSHARE Authorisation Registry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::evidence::{AccessTarget, DelegationEvidence, PolicySet};

/// Delegation mask sent to the registry's `/delegate` endpoint.
///
/// Carries the trust-relevant identity of the evidence (issuer, subject,
/// policy sets including `maxDelegationDepth`) without its validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationMask {
    pub delegation_request: DelegationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRequest {
    pub policy_issuer: String,
    pub target: AccessTarget,
    pub policy_sets: Vec<PolicySet>,
}

impl DelegationMask {
    #[must_use]
    pub fn from_evidence(evidence: &DelegationEvidence) -> Self {
        Self {
            delegation_request: DelegationRequest {
                policy_issuer: evidence.policy_issuer.clone(),
                target: evidence.target.clone(),
                policy_sets: evidence.policy_sets.clone(),
            },
        }
    }

    #[must_use]
    pub fn policy_issuer(&self) -> &str {
        &self.delegation_request.policy_issuer
    }

    #[must_use]
    pub fn access_subject(&self) -> &str {
        &self.delegation_request.target.access_subject
    }
}

/// Registry answer for a delegation mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryVerdict {
    /// The registry returned a token this deployment recognizes.
    Recognized,
    /// Anything else.
    Unrecognized,
}

impl RegistryVerdict {
    #[must_use]
    pub fn is_trusted(self) -> bool {
        matches!(self, Self::Recognized)
    }
}

/// Client for the Authorisation Registry.
///
/// Implementations must bound the call with a timeout and surface transport
/// failures as [`RegistryError`]; callers treat any error as untrusted.
#[async_trait]
pub trait AuthorisationRegistryClient: Send + Sync {
    /// Submit a delegation mask and classify the registry's answer.
    ///
    /// # Errors
    ///
    /// - `Timeout` / `Transport` when the registry cannot be reached
    /// - `UnexpectedStatus` when the registry answers with a non-success status
    async fn delegate(&self, mask: &DelegationMask) -> Result<RegistryVerdict, RegistryError>;
}
