//! Domain errors for the iSHARE PEP engine.
//!
//! These only arise while building the engine from configuration; once built,
//! every request-time failure is folded into a denial.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid token key: {0}")]
    InvalidKey(String),

    #[error("invalid public path pattern `{pattern}`: {reason}")]
    InvalidPublicPath { pattern: String, reason: String },

    #[error("invalid registry configuration: {0}")]
    InvalidRegistry(String),
}
