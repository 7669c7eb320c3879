//! Policy matching against delegation evidence.
//!
//! Policy sets and policies are scanned in order and the first policy that
//! matches an operation decides its effect. A batch is permitted only if every
//! operation in it is permitted. Nothing matching means deny.

use ishare_pep_sdk::{DelegationEvidence, Effect, Policy, PolicySet, RequestedOperation, WILDCARD};

/// Outcome of matching a set of operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchVerdict {
    Permit,
    Deny(MatchDenial),
}

impl MatchVerdict {
    #[must_use]
    pub fn is_permit(&self) -> bool {
        matches!(self, Self::Permit)
    }
}

/// Why a set of operations was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchDenial {
    /// Nothing was requested, so nothing can be authorized.
    NoOperations,
    /// No eligible policy covers this operation.
    NoMatchingPolicy(RequestedOperation),
    /// The first matching policy denies this operation.
    ExplicitDeny(RequestedOperation),
}

#[derive(Debug, Clone, Default)]
pub struct PolicyMatcher {
    required_licenses: Vec<String>,
}

impl PolicyMatcher {
    /// A matcher that considers only policy sets asserting every license in
    /// `required_licenses`. An empty list makes every policy set eligible.
    #[must_use]
    pub fn new(required_licenses: Vec<String>) -> Self {
        Self { required_licenses }
    }

    /// Evaluate every operation; the first non-permitted one decides the denial.
    #[must_use]
    pub fn evaluate(
        &self,
        evidence: &DelegationEvidence,
        operations: &[RequestedOperation],
    ) -> MatchVerdict {
        if operations.is_empty() {
            return MatchVerdict::Deny(MatchDenial::NoOperations);
        }

        for op in operations {
            match self.evaluate_operation(evidence, op) {
                Some(Effect::Permit) => {}
                Some(Effect::Deny) => {
                    return MatchVerdict::Deny(MatchDenial::ExplicitDeny(op.clone()));
                }
                None => return MatchVerdict::Deny(MatchDenial::NoMatchingPolicy(op.clone())),
            }
        }

        MatchVerdict::Permit
    }

    /// Effect of the first policy matching `op`, or `None` if nothing matches.
    #[must_use]
    pub fn evaluate_operation(
        &self,
        evidence: &DelegationEvidence,
        op: &RequestedOperation,
    ) -> Option<Effect> {
        evidence
            .policy_sets
            .iter()
            .filter(|set| self.is_eligible(set))
            .flat_map(|set| &set.policies)
            .find(|policy| policy_matches(policy, op))
            .map(Policy::effect)
    }

    fn is_eligible(&self, set: &PolicySet) -> bool {
        let licenses = set.licenses();
        self.required_licenses
            .iter()
            .all(|required| licenses.contains(required))
    }
}

fn policy_matches(policy: &Policy, op: &RequestedOperation) -> bool {
    let resource = &policy.target.resource;

    let type_matches =
        resource.resource_type == WILDCARD || resource.resource_type == op.resource_type;

    // A request for every entity of a type is only covered by an unrestricted policy.
    let identifier_matches = if op.resource_identifier == WILDCARD {
        resource.identifiers.iter().any(|id| id == WILDCARD)
    } else {
        resource
            .identifiers
            .iter()
            .any(|id| id == WILDCARD || *id == op.resource_identifier)
    };

    let action_matches = policy
        .target
        .actions
        .iter()
        .any(|action| action.eq_ignore_ascii_case(&op.action));

    type_matches && identifier_matches && action_matches
}
