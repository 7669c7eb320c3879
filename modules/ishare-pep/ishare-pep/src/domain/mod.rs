//! Domain layer for the iSHARE PEP decision engine.

pub mod cache;
pub mod error;
pub mod local_client;
pub mod matcher;
pub mod normalizer;
pub mod public_paths;
pub mod service;
pub mod token;
pub mod trust;

pub use cache::{DecisionCache, TrustKey};
pub use error::DomainError;
pub use local_client::PepGwLocalClient;
pub use matcher::{MatchDenial, MatchVerdict, PolicyMatcher};
pub use normalizer::{has_dot_segments, normalize};
pub use public_paths::PublicPathMatcher;
pub use service::Service;
pub use token::{TokenError, TokenVerifier, VerifiedToken};
pub use trust::{EvidenceTrustValidator, TrustError};
