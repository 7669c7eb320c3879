//! iSHARE PEP SDK
//!
//! This crate provides the public API for the `ishare_pep` module:
//!
//! - [`PepGatewayClient`] - Authorization API consumed by the proxy layer
//! - [`AuthorisationRegistryClient`] - Outbound seam to the iSHARE Authorisation Registry
//! - [`DelegationEvidence`], [`PolicySet`], [`Policy`] - Delegation evidence model
//! - [`InboundRequest`], [`RequestedOperation`] - Request-side models
//! - [`AuthorizationDecision`], [`Decision`], [`DenyReason`] - Decision models
//! - [`RegistryError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use ishare_pep_sdk::{InboundRequest, PepGatewayClient};
//!
//! let request = InboundRequest::new(Method::GET, "/entities/urn:ngsi-ld:SoilSensor:1111")
//!     .with_query("type=SoilSensor");
//!
//! let decision = pep.authorize(Some(raw_token), &request).await;
//! if !decision.allow {
//!     // respond with decision.http_status
//! }
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod evidence;
pub mod models;
pub mod registry_api;

// Re-export main types at crate root
pub use api::PepGatewayClient;
pub use error::RegistryError;
pub use evidence::{
    AccessTarget, DelegationEvidence, Effect, Environment, Policy, PolicySet, PolicySetTarget,
    PolicyTarget, ResourceTarget, Rule, WILDCARD,
};
pub use models::{AuthorizationDecision, Decision, DenyReason, InboundRequest, RequestedOperation};
pub use registry_api::{AuthorisationRegistryClient, DelegationMask, RegistryVerdict};
