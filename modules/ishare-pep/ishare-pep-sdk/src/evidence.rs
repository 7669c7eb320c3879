//! Delegation evidence model.
//!
//! Mirrors the iSHARE `delegationEvidence` JSON structure carried inside the
//! signed bearer token. Field names follow the wire format (`camelCase`).

use serde::{Deserialize, Serialize};

/// Wildcard value accepted in `type`, `identifiers` and `attributes`.
pub const WILDCARD: &str = "*";

/// The authorization grant embedded in a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationEvidence {
    /// Start of the validity window (epoch seconds, inclusive).
    pub not_before: i64,
    /// End of the validity window (epoch seconds, exclusive).
    pub not_on_or_after: i64,
    /// Identifier of the issuing policy authority.
    pub policy_issuer: String,
    /// The party the evidence is delegated to.
    pub target: AccessTarget,
    /// Ordered policy sets. Order is significant for matching.
    #[serde(default)]
    pub policy_sets: Vec<PolicySet>,
}

impl DelegationEvidence {
    /// Whether `now` falls in `[not_before, not_on_or_after)`.
    #[must_use]
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.not_before <= now && now < self.not_on_or_after
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTarget {
    pub access_subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySet {
    /// Upper bound on the delegation chain length. Forwarded to the registry.
    #[serde(default)]
    pub max_delegation_depth: u32,
    #[serde(default)]
    pub target: PolicySetTarget,
    #[serde(default)]
    pub policies: Vec<Policy>,
}

impl PolicySet {
    /// Licenses asserted by this policy set.
    #[must_use]
    pub fn licenses(&self) -> &[String] {
        &self.target.environment.licenses
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySetTarget {
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub licenses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub target: PolicyTarget,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Policy {
    /// Effect of the first rule. A policy without rules yields `Deny`.
    #[must_use]
    pub fn effect(&self) -> Effect {
        self.rules.first().map_or(Effect::Deny, |rule| rule.effect)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTarget {
    pub resource: ResourceTarget,
    #[serde(default)]
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTarget {
    /// Resource type name, or `*`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Concrete identifiers, or `["*"]`.
    #[serde(default)]
    pub identifiers: Vec<String>,
    /// Attribute names, or `["*"]`. Accepted but not used for matching.
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub effect: Effect,
}

/// Rule effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Permit,
    Deny,
}
