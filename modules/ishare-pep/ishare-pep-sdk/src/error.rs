//! Error types for the iSHARE PEP SDK.

use thiserror::Error;

/// Failure talking to the Authorisation Registry.
///
/// Every variant is treated as `Untrusted` by the trust validator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry request timed out")]
    Timeout,

    #[error("registry returned unexpected status {0}")]
    UnexpectedStatus(u16),

    #[error("registry transport error: {0}")]
    Transport(String),
}

impl RegistryError {
    /// Whether a retry may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::UnexpectedStatus(status) => *status >= 500,
        }
    }
}
