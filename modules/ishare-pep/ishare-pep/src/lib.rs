//! iSHARE PEP decision engine.
//!
//! Decides whether an inbound request may reach the protected data service,
//! based on the iSHARE delegation evidence embedded in its bearer token:
//!
//! 1. paths with dot segments are refused, public paths bypass authorization
//! 2. [`TokenVerifier`] checks the token signature and extracts the evidence
//! 3. [`EvidenceTrustValidator`] checks the validity window, the subject, and
//!    asks the Authorisation Registry (through the [`DecisionCache`]) whether the
//!    evidence is trusted
//! 4. [`normalize`] turns the request into resource operations
//! 5. [`PolicyMatcher`] evaluates the operations against the evidence policies
//!
//! [`Service`] runs the pipeline; [`PepGwLocalClient`] exposes it as an
//! [`ishare_pep_sdk::PepGatewayClient`].

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use config::{PepConfig, RegistryConfig, TokenAlgorithm, TokenConfig};
pub use domain::{
    DecisionCache, DomainError, EvidenceTrustValidator, MatchDenial, MatchVerdict,
    PepGwLocalClient, PolicyMatcher, PublicPathMatcher, Service, TokenError, TokenVerifier,
    TrustError, TrustKey, VerifiedToken, has_dot_segments, normalize,
};
pub use infra::HttpRegistryClient;
